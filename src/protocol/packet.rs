//! Engine.IO v4 / Socket.IO v5 packet codec.
//!
//! Every websocket text frame carries one Engine.IO packet. Engine.IO
//! `message` packets wrap one Socket.IO packet.
//!
//! # Engine.IO
//!
//! | Prefix | Packet | Payload |
//! |--------|--------|---------|
//! | `0` | open | `{"sid","upgrades","pingInterval","pingTimeout","maxPayload"}` |
//! | `1` | close | — |
//! | `2` | ping | — |
//! | `3` | pong | — |
//! | `4` | message | Socket.IO packet |
//! | `5` | upgrade | — |
//! | `6` | noop | — |
//!
//! # Socket.IO
//!
//! `<type>[<namespace>,][<ackId>][<json>]`, namespace omitted when `/`.
//!
//! | Type | Packet |
//! |------|--------|
//! | `0` | CONNECT |
//! | `1` | DISCONNECT |
//! | `2` | EVENT |
//! | `3` | ACK |
//! | `4` | CONNECT_ERROR |
//!
//! Binary packets (`5`, `6`) are not supported.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Engine.IO protocol revision sent in the `EIO` query parameter.
pub const ENGINE_IO_VERSION: u8 = 4;

/// Default Socket.IO namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

// ============================================================================
// OpenHandshake
// ============================================================================

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    /// Engine.IO session id.
    pub sid: String,

    /// Transports the server would upgrade to (ignored, upgrade is disabled).
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Server ping interval in milliseconds.
    pub ping_interval: u64,

    /// Grace period after a missed ping in milliseconds.
    pub ping_timeout: u64,

    /// Maximum payload size accepted by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// Time after which a silent connection is considered lost.
    #[inline]
    #[must_use]
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

// ============================================================================
// EnginePacket
// ============================================================================

/// A decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Session opened.
    Open(OpenHandshake),
    /// Session closed.
    Close,
    /// Server heartbeat; must be answered with [`EnginePacket::Pong`].
    Ping,
    /// Heartbeat answer.
    Pong,
    /// Socket.IO payload.
    Message(SocketPacket),
    /// Transport upgrade (unused: upgrade is disabled).
    Upgrade,
    /// No-op.
    Noop,
}

impl EnginePacket {
    /// Decodes a websocket text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] on an empty frame or unknown packet type
    /// - [`Error::Json`] if a JSON payload is invalid
    pub fn decode(text: &str) -> Result<Self> {
        let Some(kind) = text.chars().next() else {
            return Err(Error::protocol("empty engine.io packet"));
        };
        let body = &text[kind.len_utf8()..];

        match kind {
            '0' => Ok(Self::Open(from_str(body)?)),
            '1' => Ok(Self::Close),
            // Ping/pong may carry a probe payload; nothing depends on it.
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => Ok(Self::Message(SocketPacket::decode(body)?)),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(Error::protocol(format!(
                "unknown engine.io packet type: {other:?}"
            ))),
        }
    }

    /// Encodes into a websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if a payload fails to serialize.
    pub fn encode(&self) -> Result<String> {
        Ok(match self {
            Self::Open(handshake) => format!("0{}", to_string(handshake)?),
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Message(packet) => format!("4{}", packet.encode()?),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        })
    }
}

// ============================================================================
// SocketPacket
// ============================================================================

/// A Socket.IO packet addressed to a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    /// Target namespace (`/` by default).
    pub namespace: String,

    /// Packet type and data.
    pub kind: SocketPacketKind,
}

/// Socket.IO packet types.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacketKind {
    /// Namespace connection: auth payload from the client, `{sid}` from the server.
    Connect(Option<Value>),
    /// Namespace disconnection.
    Disconnect,
    /// Event: first argument is the event name.
    Event {
        /// Event name followed by its arguments.
        args: Vec<Value>,
        /// Acknowledgement id requested by the sender.
        ack_id: Option<u64>,
    },
    /// Acknowledgement of an earlier event.
    Ack {
        /// Acknowledged event id.
        id: u64,
        /// Acknowledgement arguments.
        args: Vec<Value>,
    },
    /// Namespace connection refused.
    ConnectError(Value),
}

impl SocketPacket {
    /// Creates a CONNECT packet, optionally carrying an auth payload.
    #[inline]
    #[must_use]
    pub fn connect(namespace: impl Into<String>, auth: Option<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: SocketPacketKind::Connect(auth),
        }
    }

    /// Creates a DISCONNECT packet.
    #[inline]
    #[must_use]
    pub fn disconnect(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: SocketPacketKind::Disconnect,
        }
    }

    /// Creates an EVENT packet with a single payload argument.
    #[inline]
    #[must_use]
    pub fn event(namespace: impl Into<String>, name: &str, payload: Value) -> Self {
        Self {
            namespace: namespace.into(),
            kind: SocketPacketKind::Event {
                args: vec![Value::String(name.to_string()), payload],
                ack_id: None,
            },
        }
    }

    /// Returns the event name of an EVENT packet.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match &self.kind {
            SocketPacketKind::Event { args, .. } => args.first().and_then(Value::as_str),
            _ => None,
        }
    }

    /// Decodes the Socket.IO part of an Engine.IO message packet.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] on unknown or binary packet types and malformed events
    /// - [`Error::Json`] if the payload is not valid JSON
    pub fn decode(text: &str) -> Result<Self> {
        let Some(kind) = text.chars().next() else {
            return Err(Error::protocol("empty socket.io packet"));
        };
        let rest = &text[kind.len_utf8()..];

        if matches!(kind, '5' | '6') {
            return Err(Error::protocol("binary socket.io packets are not supported"));
        }

        let (namespace, rest) = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => (&rest[..idx], &rest[idx + 1..]),
                None => (rest, ""),
            }
        } else {
            (DEFAULT_NAMESPACE, rest)
        };

        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| Error::protocol(format!("invalid ack id: {e}")))?,
            )
        } else {
            None
        };

        let body = &rest[digits..];
        let data: Option<Value> = if body.is_empty() {
            None
        } else {
            Some(from_str(body)?)
        };

        let kind = match kind {
            '0' => SocketPacketKind::Connect(data),
            '1' => SocketPacketKind::Disconnect,
            '2' => {
                let args = match data {
                    Some(Value::Array(args)) if args.first().is_some_and(Value::is_string) => args,
                    _ => {
                        return Err(Error::protocol(
                            "event packet must be an array starting with the event name",
                        ));
                    }
                };
                SocketPacketKind::Event { args, ack_id }
            }
            '3' => {
                let id = ack_id.ok_or_else(|| Error::protocol("ack packet without id"))?;
                let args = match data {
                    Some(Value::Array(args)) => args,
                    None => Vec::new(),
                    Some(_) => return Err(Error::protocol("ack payload must be an array")),
                };
                SocketPacketKind::Ack { id, args }
            }
            '4' => SocketPacketKind::ConnectError(data.unwrap_or(Value::Null)),
            other => {
                return Err(Error::protocol(format!(
                    "unknown socket.io packet type: {other:?}"
                )));
            }
        };

        Ok(Self {
            namespace: namespace.to_string(),
            kind,
        })
    }

    /// Encodes without the Engine.IO prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if a payload fails to serialize.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        out.push(match self.kind {
            SocketPacketKind::Connect(_) => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event { .. } => '2',
            SocketPacketKind::Ack { .. } => '3',
            SocketPacketKind::ConnectError(_) => '4',
        });

        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }

        match &self.kind {
            SocketPacketKind::Connect(Some(auth)) => out.push_str(&to_string(auth)?),
            SocketPacketKind::Connect(None) | SocketPacketKind::Disconnect => {}
            SocketPacketKind::Event { args, ack_id } => {
                if let Some(id) = ack_id {
                    let _ = write!(out, "{id}");
                }
                out.push_str(&to_string(args)?);
            }
            SocketPacketKind::Ack { id, args } => {
                let _ = write!(out, "{id}");
                out.push_str(&to_string(args)?);
            }
            SocketPacketKind::ConnectError(data) => out.push_str(&to_string(data)?),
        }

        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
