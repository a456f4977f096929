//! Wire protocol message types.
//!
//! This module defines the frames exchanged with the chat server.
//!
//! # Protocol Overview
//!
//! | Layer | Purpose |
//! |-------|---------|
//! | Engine.IO v4 | Session open/close, ping/pong heartbeat |
//! | Socket.IO v5 | Namespace connect/disconnect, named events |
//! | Chat events | `new_message`, `user_typing`, `join_room`, ... |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `packet` | Engine.IO / Socket.IO packet codec |
//! | `event` | Typed inbound and outbound chat events |

// ============================================================================
// Submodules
// ============================================================================

/// Typed chat events.
pub mod event;

/// Engine.IO / Socket.IO packet codec.
pub mod packet;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{
    ContentType, InboundEvent, OutboundEvent, ParsedEvent, WireMessage, WirePresence, WireTyping,
};
pub use packet::{
    DEFAULT_NAMESPACE, ENGINE_IO_VERSION, EnginePacket, OpenHandshake, SocketPacket,
    SocketPacketKind,
};
