//! Type-safe identifiers for chat entities.
//!
//! The chat server is not consistent about identifier shapes: rooms and
//! users arrive as integers from some endpoints and as strings from others.
//! [`WireId`] keeps whichever shape arrived so it is echoed back unchanged,
//! and the newtypes prevent mixing a room with a user at compile time.
//!
//! | Type | Wire fields |
//! |------|-------------|
//! | [`RoomId`] | `roomId` |
//! | [`UserId`] | `senderId`, `userId` |
//! | [`MessageId`] | `id` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// WireId
// ============================================================================

/// Identifier as it appears on the wire: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// Numeric identifier (`9`).
    Number(i64),
    /// Textual identifier (`"room-9"`).
    Text(String),
}

impl WireId {
    /// Returns `true` for `0` and `""`.
    ///
    /// These count as "absent" when applying the room fallback.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(n) => *n == 0,
            Self::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for WireId {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for WireId {
    #[inline]
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<u32> for WireId {
    #[inline]
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<String> for WireId {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for WireId {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

// ============================================================================
// Identifier Newtypes
// ============================================================================

macro_rules! wire_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(WireId);

        impl $name {
            /// Creates an identifier from any wire-compatible value.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<WireId>) -> Self {
                Self(id.into())
            }

            /// Returns the underlying wire value.
            #[inline]
            #[must_use]
            pub fn as_wire(&self) -> &WireId {
                &self.0
            }

            /// Returns `true` for `0` and `""`.
            #[inline]
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.is_blank()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            #[inline]
            fn from(value: i64) -> Self {
                Self::new(value)
            }
        }

        impl From<i32> for $name {
            #[inline]
            fn from(value: i32) -> Self {
                Self::new(value)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(value: u32) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

wire_identifier! {
    /// Chat room identifier.
    RoomId
}

wire_identifier! {
    /// User identifier (sender of a message, typist, room member).
    UserId
}

wire_identifier! {
    /// Server-assigned message identifier.
    MessageId
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id_keeps_shape() {
        let room: RoomId = serde_json::from_str("9").expect("parse");
        assert_eq!(room, RoomId::from(9));
        assert_eq!(serde_json::to_string(&room).expect("serialize"), "9");
    }

    #[test]
    fn test_text_id_keeps_shape() {
        let room: RoomId = serde_json::from_str(r#""room-9""#).expect("parse");
        assert_eq!(room, RoomId::from("room-9"));
        assert_eq!(
            serde_json::to_string(&room).expect("serialize"),
            r#""room-9""#
        );
    }

    #[test]
    fn test_number_and_text_are_distinct() {
        assert_ne!(RoomId::from(9), RoomId::from("9"));
    }

    #[test]
    fn test_blank_ids() {
        assert!(RoomId::from(0).is_blank());
        assert!(RoomId::from("").is_blank());
        assert!(!RoomId::from(9).is_blank());
        assert!(!UserId::from("u1").is_blank());
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageId::from(42).to_string(), "42");
        assert_eq!(UserId::from("alice").to_string(), "alice");
    }

    #[test]
    fn test_float_rejected() {
        assert!(serde_json::from_str::<RoomId>("1.5").is_err());
    }
}
