//! Chat events carried inside Socket.IO EVENT packets.
//!
//! # Inbound
//!
//! | Event | Payload |
//! |-------|---------|
//! | `new_message` | `{message:{id, message, senderId, senderName, createdAt, roomId, avatar, avatarColor}}` |
//! | `user_typing` | `{userId, userName, roomId}` |
//! | `user_stopped_typing` | `{userId, userName, roomId}` |
//! | `joined_room` | `{roomId, userId?, userName?}` |
//! | `user_joined_room` | `{roomId, userId?, userName?}` |
//! | `user_left_room` | `{roomId, userId?, userName?}` |
//! | `test_message` | any |
//!
//! # Outbound
//!
//! | Event | Payload |
//! |-------|---------|
//! | `join_room` | `{roomId}` |
//! | `send_message` | `{roomId, content, type:"text"}` |
//! | `typing_start` | `{roomId}` |
//! | `typing_stop` | `{roomId}` |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, from_value, json};

use crate::identifiers::{MessageId, RoomId, UserId};

use super::packet::{SocketPacket, SocketPacketKind};

// ============================================================================
// Event Names
// ============================================================================

/// Wire event names.
pub mod names {
    /// Inbound: a chat message was posted.
    pub const NEW_MESSAGE: &str = "new_message";
    /// Inbound: someone started typing.
    pub const USER_TYPING: &str = "user_typing";
    /// Inbound: someone stopped typing.
    pub const USER_STOPPED_TYPING: &str = "user_stopped_typing";
    /// Inbound: the server confirmed our room membership.
    pub const JOINED_ROOM: &str = "joined_room";
    /// Inbound: another user joined the room.
    pub const USER_JOINED_ROOM: &str = "user_joined_room";
    /// Inbound: another user left the room.
    pub const USER_LEFT_ROOM: &str = "user_left_room";
    /// Inbound: server diagnostics.
    pub const TEST_MESSAGE: &str = "test_message";

    /// Outbound: join a room.
    pub const JOIN_ROOM: &str = "join_room";
    /// Outbound: post a message.
    pub const SEND_MESSAGE: &str = "send_message";
    /// Outbound: typing started.
    pub const TYPING_START: &str = "typing_start";
    /// Outbound: typing stopped.
    pub const TYPING_STOP: &str = "typing_stop";
}

// ============================================================================
// Wire Payloads
// ============================================================================

/// Message object inside a `new_message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Server-assigned id.
    pub id: MessageId,
    /// Message text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Author.
    pub sender_id: UserId,
    /// Author display name.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Server timestamp, passed through verbatim.
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    /// Room the message belongs to; may be omitted by the server.
    #[serde(default)]
    pub room_id: Option<RoomId>,
    /// Author avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Author avatar background color.
    #[serde(default)]
    pub avatar_color: Option<String>,
}

/// Payload of `user_typing` / `user_stopped_typing`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTyping {
    /// Typist.
    pub user_id: UserId,
    /// Typist display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    /// Room; may be omitted by the server.
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

/// Payload of the room presence events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePresence {
    /// Room; may be omitted by the server.
    #[serde(default)]
    pub room_id: Option<RoomId>,
    /// User concerned.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// User display name.
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Reads an explicit `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// InboundEvent
// ============================================================================

/// An event received from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Event name.
    pub name: String,
    /// First argument after the name (`null` if absent).
    pub payload: Value,
}

impl InboundEvent {
    /// Creates an inbound event.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Extracts an event from a Socket.IO packet.
    ///
    /// Returns `None` for non-EVENT packets.
    #[must_use]
    pub fn from_packet(packet: SocketPacket) -> Option<Self> {
        let SocketPacketKind::Event { args, .. } = packet.kind else {
            return None;
        };

        let mut args = args.into_iter();
        let name = match args.next() {
            Some(Value::String(name)) => name,
            _ => return None,
        };

        Some(Self {
            name,
            payload: args.next().unwrap_or(Value::Null),
        })
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.name.as_str() {
            names::NEW_MESSAGE => match self.payload.get("message") {
                Some(message) => match from_value::<WireMessage>(message.clone()) {
                    Ok(message) => ParsedEvent::NewMessage(message),
                    Err(e) => self.malformed(e.to_string()),
                },
                None => self.malformed("missing `message` field"),
            },

            names::USER_TYPING => self.typed(ParsedEvent::UserTyping),

            names::USER_STOPPED_TYPING => self.typed(ParsedEvent::UserStoppedTyping),

            names::JOINED_ROOM => self.presence(ParsedEvent::JoinedRoom),

            names::USER_JOINED_ROOM => self.presence(ParsedEvent::UserJoinedRoom),

            names::USER_LEFT_ROOM => self.presence(ParsedEvent::UserLeftRoom),

            names::TEST_MESSAGE => ParsedEvent::TestMessage(self.payload.clone()),

            _ => ParsedEvent::Unknown {
                name: self.name.clone(),
                payload: self.payload.clone(),
            },
        }
    }

    /// Deserializes the whole payload into `T`.
    fn typed<T, F>(&self, wrap: F) -> ParsedEvent
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> ParsedEvent,
    {
        match from_value::<T>(self.payload.clone()) {
            Ok(payload) => wrap(payload),
            Err(e) => self.malformed(e.to_string()),
        }
    }

    /// Presence payloads are all optional; a missing payload is tolerated.
    fn presence<F>(&self, wrap: F) -> ParsedEvent
    where
        F: FnOnce(WirePresence) -> ParsedEvent,
    {
        if self.payload.is_null() {
            return wrap(WirePresence::default());
        }
        self.typed(wrap)
    }

    #[inline]
    fn malformed(&self, reason: impl Into<String>) -> ParsedEvent {
        ParsedEvent::Malformed {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed inbound event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// `new_message`.
    NewMessage(WireMessage),
    /// `user_typing`.
    UserTyping(WireTyping),
    /// `user_stopped_typing`.
    UserStoppedTyping(WireTyping),
    /// `joined_room`.
    JoinedRoom(WirePresence),
    /// `user_joined_room`.
    UserJoinedRoom(WirePresence),
    /// `user_left_room`.
    UserLeftRoom(WirePresence),
    /// `test_message`.
    TestMessage(Value),
    /// Known event whose payload did not match its shape.
    Malformed {
        /// Event name.
        name: String,
        /// Why parsing failed.
        reason: String,
    },
    /// Unknown event type.
    Unknown {
        /// Event name.
        name: String,
        /// Event payload.
        payload: Value,
    },
}

// ============================================================================
// OutboundEvent
// ============================================================================

/// Content type of an outgoing message. Only text is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Plain text.
    #[default]
    Text,
}

/// An event sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Join a room.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },
    /// Post a message.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Message text.
        content: String,
    },
    /// Typing started.
    TypingStart {
        /// Room being typed in.
        room_id: RoomId,
    },
    /// Typing stopped.
    TypingStop {
        /// Room being typed in.
        room_id: RoomId,
    },
}

impl OutboundEvent {
    /// Returns the wire event name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => names::JOIN_ROOM,
            Self::SendMessage { .. } => names::SEND_MESSAGE,
            Self::TypingStart { .. } => names::TYPING_START,
            Self::TypingStop { .. } => names::TYPING_STOP,
        }
    }

    /// Returns the room the event targets.
    #[inline]
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id }
            | Self::SendMessage { room_id, .. }
            | Self::TypingStart { room_id }
            | Self::TypingStop { room_id } => room_id,
        }
    }

    /// Returns the wire payload.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::SendMessage { room_id, content } => json!({
                "roomId": room_id,
                "content": content,
                "type": ContentType::Text,
            }),
            Self::JoinRoom { room_id }
            | Self::TypingStart { room_id }
            | Self::TypingStop { room_id } => json!({ "roomId": room_id }),
        }
    }

    /// Wraps the event in a Socket.IO EVENT packet.
    #[inline]
    #[must_use]
    pub fn to_packet(&self, namespace: &str) -> SocketPacket {
        SocketPacket::event(namespace, self.name(), self.payload())
    }
}

// ============================================================================
// Tests
// ============================================================================
