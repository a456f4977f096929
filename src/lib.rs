//! Counsel Chat - Real-time chat transport for counselling dashboards.
//!
//! This library connects a client to a Socket.IO chat server, keeps it in
//! the right room across reconnects, and hands normalized messages, typing
//! indicators and presence changes to registered listeners.
//!
//! # Architecture
//!
//! - **Chat layer**: [`ChatTransport`] owns one connection, the current
//!   room/user context, and the listener registries
//! - **Transport layer**: a tokio task per connection speaking Engine.IO v4 /
//!   Socket.IO v5 over a websocket, with heartbeats and reconnection
//!
//! Key design principles:
//!
//! - Explicit construction: build a [`ChatTransport`] and pass it around
//! - One connection per transport; `connect` replaces the previous one
//! - Events from a superseded connection are never delivered
//! - Operations never fail; problems are logged with `tracing`
//!
//! # Quick Start
//!
//! ```no_run
//! use counsel_chat::{ChatTransport, MessageDraft, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let chat = ChatTransport::builder()
//!         .server_url("https://chat.example.org")
//!         .build()?;
//!
//!     let _messages = chat.on_message(|message| {
//!         println!("[{}] {}", message.room_id, message.message);
//!     });
//!
//!     chat.connect(9, 42, Some("jwt"));
//!     chat.send_message(MessageDraft::new("Hello"));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`chat`] | [`ChatTransport`], builder, listeners, data model |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Room, user and message ids |
//! | [`protocol`] | Engine.IO / Socket.IO packets and chat events |
//! | [`transport`] | Websocket connection and reconnection |

// ============================================================================
// Modules
// ============================================================================

/// Chat transport, listeners and data model.
///
/// Use [`ChatTransport::builder()`] to create a configured transport.
pub mod chat;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for chat entities.
///
/// Newtype wrappers prevent mixing rooms and users at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Engine.IO / Socket.IO packet codec and typed chat events.
pub mod protocol;

/// Websocket transport layer.
///
/// Connection task, heartbeat handling and reconnection policy.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Chat types
pub use chat::{
    ChatMessage, ChatOptions, ChatTransport, ChatTransportBuilder, MessageDraft, RoomEvent,
    RoomEventKind, Subscription, TypingRoster, TypingStatus,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MessageId, RoomId, UserId, WireId};

// Transport types
pub use transport::{
    ConnectRequest, Connector, DisconnectReason, EventSink, Link, ReconnectPolicy,
    SocketIoConnector, WireEvent,
};
