//! Real-time transport layer.
//!
//! This module owns the wire connection the chat layer is built on:
//! one websocket speaking Socket.IO, with heartbeat handling and the
//! client-side reconnection policy.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   Link::emit    ┌──────────────────┐   websocket   ┌──────────┐
//! │  ChatTransport  │────────────────►│  event loop task │◄─────────────►│  server  │
//! │                 │◄────────────────│  (per connect)   │   EIO=4       │          │
//! └─────────────────┘   EventSink     └──────────────────┘               └──────────┘
//! ```
//!
//! The chat layer only sees the [`Connector`] / [`Link`] seam, so the wire
//! implementation can be swapped (tests use an in-memory connector).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnection delay policy |
//! | `connection` | Socket.IO websocket connector and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnection delay policy.
pub mod backoff;

/// Socket.IO websocket connector and event loop.
pub mod connection;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{InboundEvent, OutboundEvent};

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::ReconnectPolicy;
pub use connection::SocketIoConnector;

// ============================================================================
// Types
// ============================================================================

/// Callback receiving every [`WireEvent`] of one connection.
pub type EventSink = Arc<dyn Fn(WireEvent) + Send + Sync>;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// We closed the connection.
    ClientDisconnect,
    /// The server sent a Socket.IO DISCONNECT. No reconnection follows.
    ServerDisconnect,
    /// The websocket was closed.
    TransportClose,
    /// The websocket failed.
    TransportError,
    /// No heartbeat within `pingInterval + pingTimeout`.
    PingTimeout,
}

impl DisconnectReason {
    /// Returns the Socket.IO reason string.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientDisconnect => "io client disconnect",
            Self::ServerDisconnect => "io server disconnect",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
            Self::PingTimeout => "ping timeout",
        }
    }

    /// Returns `true` if the connection will try to come back on its own.
    #[inline]
    #[must_use]
    pub const fn reconnects(self) -> bool {
        !matches!(self, Self::ClientDisconnect | Self::ServerDisconnect)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event produced by a connection, named after its Socket.IO client counterpart.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// `connect`: namespace session established.
    Connected,
    /// `disconnect`: session ended.
    Disconnected(DisconnectReason),
    /// `error`: connection-level failure.
    Error(String),
    /// `connect_timeout`: handshake did not finish in time.
    ConnectTimeout,
    /// `reconnect_attempt`: a new attempt is starting.
    ReconnectAttempt(u32),
    /// `reconnect_error`: a reconnection attempt failed.
    ReconnectError(String),
    /// `reconnect_failed`: the attempt budget is exhausted.
    ReconnectFailed,
    /// Application event.
    Event(InboundEvent),
}

impl WireEvent {
    /// Returns the Socket.IO client event name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Connected => "connect",
            Self::Disconnected(_) => "disconnect",
            Self::Error(_) => "error",
            Self::ConnectTimeout => "connect_timeout",
            Self::ReconnectAttempt(_) => "reconnect_attempt",
            Self::ReconnectError(_) => "reconnect_error",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Event(event) => &event.name,
        }
    }
}

/// Parameters of one `connect` call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Credential sent in the auth payload and the `token` query parameter.
    pub token: Option<String>,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Opens connections.
pub trait Connector: Send + Sync {
    /// Starts a connection and returns its handle immediately.
    ///
    /// Progress is reported through `sink`. Implementations must not call
    /// `sink` before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be started at all
    /// (e.g. [`Error::Runtime`](crate::Error::Runtime) outside a tokio runtime).
    fn open(&self, request: ConnectRequest, sink: EventSink) -> Result<Box<dyn Link>>;
}

/// Handle to one open connection.
///
/// Dropping the handle closes the connection.
pub trait Link: Send + Sync {
    /// Queues an outbound event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    /// connection has terminated.
    fn emit(&self, event: &OutboundEvent) -> Result<()>;

    /// Closes the connection. Idempotent.
    fn close(&self);
}

// ============================================================================
// Tests
// ============================================================================
