//! Chat transport configuration.
//!
//! [`ChatOptions`] holds validated settings; build one through
//! [`ChatTransportBuilder`](super::ChatTransportBuilder) or directly.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use counsel_chat::ChatOptions;
//! use url::Url;
//!
//! let options = ChatOptions::new(Url::parse("https://chat.example.org").unwrap())
//!     .with_namespace("/counselling")
//!     .with_typing_idle_timeout(Duration::from_secs(2));
//!
//! assert_eq!(options.endpoint().unwrap().as_str(), "wss://chat.example.org/socket.io/");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_NAMESPACE;
use crate::transport::connection::DEFAULT_CONNECT_TIMEOUT;
use crate::transport::{ReconnectPolicy, SocketIoConnector};

use super::typing::DEFAULT_TYPING_IDLE_TIMEOUT;

// ============================================================================
// Constants
// ============================================================================

/// Default Socket.IO endpoint path.
pub const DEFAULT_PATH: &str = "/socket.io/";

// ============================================================================
// ChatOptions
// ============================================================================

/// Chat transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// Server base URL (`http`, `https`, `ws` or `wss`).
    pub server_url: Url,

    /// Socket.IO endpoint path.
    pub path: String,

    /// Socket.IO namespace.
    pub namespace: String,

    /// Handshake timeout.
    pub connect_timeout: Duration,

    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,

    /// Idle time that ends a typing burst.
    pub typing_idle_timeout: Duration,
}

// ============================================================================
// Constructors
// ============================================================================

impl ChatOptions {
    /// Creates options for `server_url` with default settings.
    ///
    /// A non-root path in `server_url` selects the namespace, as the
    /// Socket.IO client does (`https://host/chat` → namespace `/chat`).
    #[must_use]
    pub fn new(server_url: Url) -> Self {
        let namespace = match server_url.path() {
            "" | "/" => DEFAULT_NAMESPACE.to_string(),
            path => path.trim_end_matches('/').to_string(),
        };

        Self {
            server_url,
            path: DEFAULT_PATH.to_string(),
            namespace,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            typing_idle_timeout: DEFAULT_TYPING_IDLE_TIMEOUT,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ChatOptions {
    /// Sets the Socket.IO endpoint path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the namespace.
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the typing idle timeout.
    #[inline]
    #[must_use]
    pub fn with_typing_idle_timeout(mut self, timeout: Duration) -> Self {
        self.typing_idle_timeout = timeout;
        self
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl ChatOptions {
    /// Websocket URL of the Socket.IO endpoint, without query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a scheme other than `http`, `https`,
    /// `ws` or `wss`.
    pub fn endpoint(&self) -> Result<Url> {
        let scheme = match self.server_url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::config(format!(
                    "Unsupported server URL scheme: {other}\n\
                     Use http, https, ws or wss."
                )));
            }
        };

        let mut endpoint = self.server_url.clone();
        endpoint
            .set_scheme(scheme)
            .map_err(|()| Error::config(format!("Cannot use scheme {scheme} for {}", self.server_url)))?;
        endpoint.set_path(&self.path);
        endpoint.set_query(None);
        endpoint.set_fragment(None);

        Ok(endpoint)
    }

    /// Creates the websocket connector for these options.
    ///
    /// # Errors
    ///
    /// Same as [`endpoint`](Self::endpoint).
    pub fn connector(&self) -> Result<SocketIoConnector> {
        Ok(SocketIoConnector::new(self.endpoint()?)
            .with_namespace(self.namespace.clone())
            .with_connect_timeout(self.connect_timeout)
            .with_reconnect_policy(self.reconnect.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
