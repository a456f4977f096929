//! Builder pattern for chat transport configuration.
//!
//! Provides a fluent API for configuring and creating [`ChatTransport`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use counsel_chat::ChatTransport;
//!
//! # fn example() -> counsel_chat::Result<()> {
//! let chat = ChatTransport::builder()
//!     .server_url("https://chat.example.org")
//!     .connect_timeout(Duration::from_secs(10))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Connector, ReconnectPolicy};

use super::core::ChatTransport;
use super::options::ChatOptions;

// ============================================================================
// ChatTransportBuilder
// ============================================================================

/// Builder for configuring a [`ChatTransport`].
///
/// Use [`ChatTransport::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ChatTransportBuilder {
    /// Server base URL, unparsed.
    server_url: Option<String>,
    /// Socket.IO endpoint path.
    path: Option<String>,
    /// Socket.IO namespace.
    namespace: Option<String>,
    /// Handshake timeout.
    connect_timeout: Option<Duration>,
    /// Reconnection policy.
    reconnect: Option<ReconnectPolicy>,
    /// Typing idle timeout.
    typing_idle_timeout: Option<Duration>,
    /// Custom connector replacing the websocket one.
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ChatTransportBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatTransportBuilder")
            .field("server_url", &self.server_url)
            .field("path", &self.path)
            .field("namespace", &self.namespace)
            .field("connect_timeout", &self.connect_timeout)
            .field("reconnect", &self.reconnect)
            .field("typing_idle_timeout", &self.typing_idle_timeout)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// ChatTransportBuilder Implementation
// ============================================================================

impl ChatTransportBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL.
    ///
    /// # Arguments
    ///
    /// * `url` - `http`, `https`, `ws` or `wss` URL (e.g., "https://chat.example.org")
    #[inline]
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Sets the Socket.IO endpoint path (default `/socket.io/`).
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the Socket.IO namespace (default `/`, or the server URL path).
    #[inline]
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the handshake timeout (default 20s).
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Sets how long after the last keystroke typing stops (default 3s).
    #[inline]
    #[must_use]
    pub fn typing_idle_timeout(mut self, timeout: Duration) -> Self {
        self.typing_idle_timeout = Some(timeout);
        self
    }

    /// Replaces the websocket connector.
    ///
    /// The server URL is still validated but no longer used to connect.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the transport with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the server URL is missing, unparsable, or not
    ///   `http`/`https`/`ws`/`wss`
    /// - [`Error::Config`] if path or namespace do not start with `/`
    /// - [`Error::Config`] if a timeout is zero
    pub fn build(self) -> Result<ChatTransport> {
        let options = self.validate_options()?;

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(options.connector()?),
        };

        Ok(ChatTransport::new(options, connector))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ChatTransportBuilder {
    /// Validates settings and assembles [`ChatOptions`].
    fn validate_options(&self) -> Result<ChatOptions> {
        let server_url = self.validate_server_url()?;

        let mut options = ChatOptions::new(server_url);

        if let Some(path) = &self.path {
            if !path.starts_with('/') {
                return Err(Error::config(format!(
                    "Socket.IO path must start with '/': {path:?}"
                )));
            }
            options = options.with_path(path.clone());
        }

        if let Some(namespace) = &self.namespace {
            if !namespace.starts_with('/') {
                return Err(Error::config(format!(
                    "Socket.IO namespace must start with '/': {namespace:?}"
                )));
            }
            options = options.with_namespace(namespace.clone());
        }

        if let Some(timeout) = self.connect_timeout {
            if timeout.is_zero() {
                return Err(Error::config("Connect timeout must be greater than zero"));
            }
            options = options.with_connect_timeout(timeout);
        }

        if let Some(timeout) = self.typing_idle_timeout {
            if timeout.is_zero() {
                return Err(Error::config("Typing idle timeout must be greater than zero"));
            }
            options = options.with_typing_idle_timeout(timeout);
        }

        if let Some(policy) = &self.reconnect {
            options = options.with_reconnect(policy.clone());
        }

        // Scheme check.
        options.endpoint()?;

        Ok(options)
    }

    /// Validates the server URL configuration.
    fn validate_server_url(&self) -> Result<Url> {
        let raw = self.server_url.as_deref().ok_or_else(|| {
            Error::config(
                "Server URL is required. Use .server_url() to set it.\n\
                 Example: ChatTransport::builder().server_url(\"https://chat.example.org\")",
            )
        })?;

        Url::parse(raw).map_err(|e| Error::config(format!("Invalid server URL {raw:?}: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
