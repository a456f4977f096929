//! Chat transport module.
//!
//! This module provides the main entry point for real-time chat.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatTransport`] | Connection owner and listener hub |
//! | [`ChatTransportBuilder`] | Fluent configuration builder |
//! | [`ChatOptions`] | Validated transport settings |
//! | [`Subscription`] | Handle for removing one listener |
//! | [`TypingRoster`] | Who-is-typing bookkeeping for UIs |
//!
//! # Example
//!
//! ```no_run
//! use counsel_chat::{ChatTransport, MessageDraft, Result};
//!
//! # async fn example() -> Result<()> {
//! let chat = ChatTransport::builder()
//!     .server_url("https://chat.example.org")
//!     .build()?;
//!
//! let _online = chat.on_connection_change(|connected| {
//!     println!("connected: {connected}");
//! });
//!
//! chat.connect(9, 42, Some("jwt"));
//! chat.notify_typing(9);
//! chat.send_message(MessageDraft::new("Good morning"));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for transport configuration.
pub mod builder;

/// Core transport implementation.
pub mod core;

/// Listener registries and subscription handles.
pub mod listeners;

/// Chat data model.
pub mod model;

/// Inbound event normalization.
pub mod normalize;

/// Transport settings.
pub mod options;

/// Typing indicator helpers.
pub mod typing;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ChatTransportBuilder;
pub use core::ChatTransport;
pub use listeners::Subscription;
pub use model::{ChatMessage, MessageDraft, RoomEvent, RoomEventKind, TypingStatus};
pub use normalize::{Notification, normalize, resolve_room};
pub use options::ChatOptions;
pub use typing::TypingRoster;
