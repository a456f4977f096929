//! Chat data model delivered to listeners.
//!
//! | Type | Produced by |
//! |------|-------------|
//! | [`ChatMessage`] | `new_message` |
//! | [`TypingStatus`] | `user_typing`, `user_stopped_typing` |
//! | [`RoomEvent`] | `joined_room`, `user_joined_room`, `user_left_room` |
//! | [`MessageDraft`] | Caller, for [`ChatTransport::send_message`](super::ChatTransport::send_message) |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{MessageId, RoomId, UserId};

// ============================================================================
// ChatMessage
// ============================================================================

/// A message received from the server.
///
/// Serializes in the camelCase shape UI code expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned id.
    pub id: MessageId,

    /// Message text.
    pub message: String,

    /// Author.
    pub sender_id: UserId,

    /// Author display name (`senderName` on the wire).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Author avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Author avatar background color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_color: Option<String>,

    /// Server timestamp, verbatim.
    pub created_at: String,

    /// Room, after fallback to the current room.
    pub room_id: RoomId,
}

// ============================================================================
// TypingStatus
// ============================================================================

/// Someone started or stopped typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatus {
    /// Typist.
    pub user_id: UserId,
    /// Typist display name.
    pub user_name: String,
    /// `true` for `user_typing`, `false` for `user_stopped_typing`.
    pub is_typing: bool,
    /// Room, after fallback to the current room.
    pub room_id: RoomId,
}

// ============================================================================
// RoomEvent
// ============================================================================

/// Kind of room presence change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomEventKind {
    /// The server confirmed our own `join_room`.
    Joined,
    /// Another user entered the room.
    UserJoined,
    /// Another user left the room.
    UserLeft,
}

/// Room presence notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    /// What happened.
    pub kind: RoomEventKind,
    /// Room, after fallback to the current room.
    pub room_id: RoomId,
    /// User concerned, when the server says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Display name, when the server says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

// ============================================================================
// MessageDraft
// ============================================================================

/// An outgoing message: no id or timestamp yet.
///
/// Only `message` and the room reach the wire; the sender fields let UI
/// code keep one shape for optimistic rendering.
///
/// # Example
///
/// ```
/// use counsel_chat::MessageDraft;
///
/// let draft = MessageDraft::new("See you Thursday").in_room(9);
/// assert_eq!(draft.message, "See you Thursday");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    /// Message text.
    pub message: String,

    /// Target room; the current room when absent or blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,

    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,

    /// Author display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Author avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Author avatar background color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_color: Option<String>,
}

impl MessageDraft {
    /// Creates a draft for the current room.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Targets a specific room.
    #[inline]
    #[must_use]
    pub fn in_room(mut self, room_id: impl Into<RoomId>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Sets the author.
    #[inline]
    #[must_use]
    pub fn from_sender(mut self, sender_id: impl Into<UserId>, user_name: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self.user_name = Some(user_name.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_chat_message_serializes_camel_case() {
        let message = ChatMessage {
            id: MessageId::from(1),
            message: "hi".into(),
            sender_id: UserId::from(2),
            user_name: Some("Bob".into()),
            avatar: None,
            avatar_color: None,
            created_at: "T".into(),
            room_id: RoomId::from(9),
        };

        assert_eq!(
            serde_json::to_value(&message).expect("serialize"),
            json!({
                "id": 1,
                "message": "hi",
                "senderId": 2,
                "userName": "Bob",
                "createdAt": "T",
                "roomId": 9
            })
        );
    }

    #[test]
    fn test_room_event_kind_names() {
        assert_eq!(
            serde_json::to_value(RoomEventKind::UserLeft).expect("serialize"),
            json!("user_left")
        );
    }

    #[test]
    fn test_draft_builders() {
        let draft = MessageDraft::new("hello")
            .in_room("room-a")
            .from_sender(4, "Dr. Rao");

        assert_eq!(draft.room_id, Some(RoomId::from("room-a")));
        assert_eq!(draft.sender_id, Some(UserId::from(4)));
        assert_eq!(draft.user_name.as_deref(), Some("Dr. Rao"));
        assert!(draft.avatar.is_none());
    }
}
