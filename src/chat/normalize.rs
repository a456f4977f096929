//! Inbound event normalization.
//!
//! Maps parsed wire events onto the chat model:
//!
//! | Wire event | Notification | Mapping |
//! |------------|--------------|---------|
//! | `new_message` | [`Notification::Message`] | `senderName` → `userName` |
//! | `user_typing` | [`Notification::Typing`] | `isTyping = true` |
//! | `user_stopped_typing` | [`Notification::Typing`] | `isTyping = false` |
//! | `joined_room` | [`Notification::Room`] | [`RoomEventKind::Joined`] |
//! | `user_joined_room` | [`Notification::Room`] | [`RoomEventKind::UserJoined`] |
//! | `user_left_room` | [`Notification::Room`] | [`RoomEventKind::UserLeft`] |
//! | `test_message` | none | logged |
//!
//! # Room fallback
//!
//! A payload without a room (missing, `null`, `""` or `0`) is attributed to
//! the transport's current room. With neither, nothing is delivered.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, warn};

use crate::identifiers::RoomId;
use crate::protocol::{ParsedEvent, WireMessage, WirePresence, WireTyping};

use super::model::{ChatMessage, RoomEvent, RoomEventKind, TypingStatus};

// ============================================================================
// Notification
// ============================================================================

/// A normalized inbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// New chat message.
    Message(ChatMessage),
    /// Typing started or stopped.
    Typing(TypingStatus),
    /// Room presence change.
    Room(RoomEvent),
}

// ============================================================================
// Normalization
// ============================================================================

/// Picks the payload room, falling back to `current`.
///
/// Blank wire rooms count as absent.
#[inline]
#[must_use]
pub fn resolve_room(wire: Option<RoomId>, current: Option<&RoomId>) -> Option<RoomId> {
    wire.filter(|room| !room.is_blank())
        .or_else(|| current.filter(|room| !room.is_blank()).cloned())
}

/// Normalizes one parsed event.
///
/// Returns `None` for events that produce no notification.
#[must_use]
pub fn normalize(event: ParsedEvent, current_room: Option<&RoomId>) -> Option<Notification> {
    match event {
        ParsedEvent::NewMessage(message) => message_notification(message, current_room),

        ParsedEvent::UserTyping(typing) => typing_notification(typing, true, current_room),

        ParsedEvent::UserStoppedTyping(typing) => typing_notification(typing, false, current_room),

        ParsedEvent::JoinedRoom(presence) => {
            room_notification(RoomEventKind::Joined, presence, current_room)
        }

        ParsedEvent::UserJoinedRoom(presence) => {
            room_notification(RoomEventKind::UserJoined, presence, current_room)
        }

        ParsedEvent::UserLeftRoom(presence) => {
            room_notification(RoomEventKind::UserLeft, presence, current_room)
        }

        ParsedEvent::TestMessage(payload) => {
            debug!(%payload, "Test message from server");
            None
        }

        ParsedEvent::Malformed { name, reason } => {
            warn!(event = %name, %reason, "Dropping malformed event");
            None
        }

        ParsedEvent::Unknown { name, .. } => {
            debug!(event = %name, "Ignoring unknown event");
            None
        }
    }
}

fn message_notification(message: WireMessage, current_room: Option<&RoomId>) -> Option<Notification> {
    let Some(room_id) = resolve_room(message.room_id, current_room) else {
        warn!(message_id = %message.id, "Dropping message without room");
        return None;
    };

    Some(Notification::Message(ChatMessage {
        id: message.id,
        message: message.message,
        sender_id: message.sender_id,
        user_name: message.sender_name,
        avatar: message.avatar,
        avatar_color: message.avatar_color,
        created_at: message.created_at,
        room_id,
    }))
}

fn typing_notification(
    typing: WireTyping,
    is_typing: bool,
    current_room: Option<&RoomId>,
) -> Option<Notification> {
    let Some(room_id) = resolve_room(typing.room_id, current_room) else {
        warn!(user_id = %typing.user_id, "Dropping typing status without room");
        return None;
    };

    Some(Notification::Typing(TypingStatus {
        user_id: typing.user_id,
        user_name: typing.user_name,
        is_typing,
        room_id,
    }))
}

fn room_notification(
    kind: RoomEventKind,
    presence: WirePresence,
    current_room: Option<&RoomId>,
) -> Option<Notification> {
    let Some(room_id) = resolve_room(presence.room_id, current_room) else {
        warn!(?kind, "Dropping room event without room");
        return None;
    };

    Some(Notification::Room(RoomEvent {
        kind,
        room_id,
        user_id: presence.user_id,
        user_name: presence.user_name,
    }))
}

// ============================================================================
// Tests
// ============================================================================
