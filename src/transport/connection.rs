//! Socket.IO websocket connection and event loop.
//!
//! [`SocketIoConnector::open`] spawns one tokio task per connection. The
//! task owns the websocket and handles:
//!
//! - The Engine.IO open / Socket.IO CONNECT handshake (bounded by `connect_timeout`)
//! - Heartbeats: every server ping is answered; silence past
//!   `pingInterval + pingTimeout` drops the session
//! - Outgoing events queued through [`Link::emit`]
//! - Reconnection with [`ReconnectPolicy`] after the session is lost
//!
//! Only the websocket transport is used and upgrades are never attempted.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{
    DEFAULT_NAMESPACE, ENGINE_IO_VERSION, EnginePacket, InboundEvent, OpenHandshake,
    OutboundEvent, SocketPacket, SocketPacketKind,
};

use super::backoff::ReconnectPolicy;
use super::{ConnectRequest, Connector, DisconnectReason, EventSink, Link, WireEvent};

// ============================================================================
// Constants
// ============================================================================

/// Default handshake timeout (Socket.IO client default).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsWrite = SplitSink<WsStream, Message>;

/// Internal commands for the event loop.
enum LinkCommand {
    /// Send an event once a session is up; dropped otherwise.
    Emit(OutboundEvent),
    /// Close the connection.
    Shutdown,
}

/// How a session ended.
enum SessionEnd {
    /// Closed on request.
    Shutdown,
    /// Lost; may reconnect.
    Lost(DisconnectReason),
}

// ============================================================================
// SocketIoConnector
// ============================================================================

/// Opens Socket.IO connections over websocket.
///
/// # Example
///
/// ```no_run
/// use counsel_chat::transport::SocketIoConnector;
/// use url::Url;
///
/// let endpoint = Url::parse("ws://localhost:5000/socket.io/").unwrap();
/// let connector = SocketIoConnector::new(endpoint).with_namespace("/chat");
/// ```
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    /// `ws`/`wss` URL including the Socket.IO path.
    endpoint: Url,
    /// Socket.IO namespace.
    namespace: String,
    /// Handshake timeout.
    connect_timeout: Duration,
    /// Reconnection policy.
    reconnect: ReconnectPolicy,
}

impl SocketIoConnector {
    /// Creates a connector for `endpoint` with default settings.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            namespace: DEFAULT_NAMESPACE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Sets the Socket.IO namespace.
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the namespace.
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Builds the websocket URL for one connection.
    ///
    /// Format: `<endpoint>?EIO=4&transport=websocket[&token=<token>]`
    #[must_use]
    pub fn handshake_url(&self, token: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
                .append_pair("transport", "websocket");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        url
    }
}

impl Connector for SocketIoConnector {
    fn open(&self, request: ConnectRequest, sink: EventSink) -> Result<Box<dyn Link>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::runtime(format!("chat connection needs a tokio runtime: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let event_loop = EventLoop {
            url: self.handshake_url(request.token.as_deref()),
            namespace: self.namespace.clone(),
            auth: request.token.map(|token| json!({ "token": token })),
            connect_timeout: self.connect_timeout,
            reconnect: self.reconnect.clone(),
            commands: command_rx,
            sink,
        };

        runtime.spawn(event_loop.run());

        Ok(Box::new(SocketIoLink { command_tx }))
    }
}

// ============================================================================
// SocketIoLink
// ============================================================================

/// Handle to a running event loop.
struct SocketIoLink {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

impl Link for SocketIoLink {
    fn emit(&self, event: &OutboundEvent) -> Result<()> {
        self.command_tx
            .send(LinkCommand::Emit(event.clone()))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(LinkCommand::Shutdown);
    }
}

// ============================================================================
// EventLoop
// ============================================================================

/// State owned by the connection task.
struct EventLoop {
    url: Url,
    namespace: String,
    auth: Option<Value>,
    connect_timeout: Duration,
    reconnect: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    sink: EventSink,
}

impl EventLoop {
    /// Connects, runs sessions, and reconnects until closed or out of attempts.
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::select! {
                result = timeout(
                    self.connect_timeout,
                    establish(&self.url, &self.namespace, self.auth.clone()),
                ) => Some(result),
                () = drain_until_shutdown(&mut self.commands) => None,
            };

            let Some(outcome) = outcome else {
                debug!("Connection closed before handshake completed");
                return;
            };

            match outcome {
                Ok(Ok((ws_stream, handshake))) => {
                    if attempt > 0 {
                        info!(attempt, "Reconnected");
                    }
                    attempt = 0;

                    (self.sink)(WireEvent::Connected);

                    match self.run_session(ws_stream, &handshake).await {
                        SessionEnd::Shutdown => {
                            (self.sink)(WireEvent::Disconnected(DisconnectReason::ClientDisconnect));
                            debug!("Event loop terminated");
                            return;
                        }
                        SessionEnd::Lost(reason) => {
                            info!(%reason, "Session lost");
                            (self.sink)(WireEvent::Disconnected(reason));
                            if !reason.reconnects() {
                                debug!("Server closed the session, not reconnecting");
                                return;
                            }
                        }
                    }
                }

                Ok(Err(e)) => {
                    warn!(error = %e, attempt, "Connection attempt failed");
                    if attempt == 0 {
                        (self.sink)(WireEvent::Error(e.to_string()));
                    } else {
                        (self.sink)(WireEvent::ReconnectError(e.to_string()));
                    }
                    if !e.is_recoverable() {
                        error!(error = %e, "Connection refused, not retrying");
                        return;
                    }
                }

                Err(_) => {
                    let timeout_ms = self.connect_timeout.as_millis() as u64;
                    warn!(timeout_ms, attempt, "Handshake timed out");
                    (self.sink)(WireEvent::ConnectTimeout);
                    if attempt > 0 {
                        (self.sink)(WireEvent::ReconnectError(
                            Error::connection_timeout(timeout_ms).to_string(),
                        ));
                    }
                }
            }

            attempt += 1;
            if !self.reconnect.allows(attempt) {
                if self.reconnect.enabled {
                    error!(attempts = attempt - 1, "Reconnection attempts exhausted");
                    (self.sink)(WireEvent::ReconnectFailed);
                }
                return;
            }

            let delay = self.reconnect.delay(attempt - 1);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

            tokio::select! {
                () = sleep(delay) => {}
                () = drain_until_shutdown(&mut self.commands) => {
                    debug!("Reconnect cancelled");
                    return;
                }
            }

            (self.sink)(WireEvent::ReconnectAttempt(attempt));
        }
    }

    /// Runs one established session until it ends.
    async fn run_session(&mut self, ws_stream: WsStream, handshake: &OpenHandshake) -> SessionEnd {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let liveness = handshake.liveness_window();
        let heartbeat = sleep(liveness);
        tokio::pin!(heartbeat);

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            heartbeat.as_mut().reset(Instant::now() + liveness);

                            match EnginePacket::decode(text.as_str()) {
                                Ok(EnginePacket::Ping) => {
                                    if let Err(e) = send_packet(&mut ws_write, &EnginePacket::Pong).await {
                                        warn!(error = %e, "Failed to answer ping");
                                        return SessionEnd::Lost(DisconnectReason::TransportError);
                                    }
                                    trace!("Pong sent");
                                }

                                Ok(EnginePacket::Close) => {
                                    return SessionEnd::Lost(DisconnectReason::TransportClose);
                                }

                                Ok(EnginePacket::Message(packet)) => {
                                    if let Some(end) = self.handle_socket_packet(packet) {
                                        return end;
                                    }
                                }

                                Ok(other) => trace!(?other, "Ignoring engine.io packet"),

                                Err(e) => warn!(error = %e, text = %text.as_str(), "Failed to decode packet"),
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            return SessionEnd::Lost(DisconnectReason::TransportClose);
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            (self.sink)(WireEvent::Error(e.to_string()));
                            return SessionEnd::Lost(DisconnectReason::TransportError);
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return SessionEnd::Lost(DisconnectReason::TransportClose);
                        }

                        // Ignore Binary, Ping, Pong frames
                        _ => {}
                    }
                }

                // Commands from the chat layer
                command = self.commands.recv() => {
                    match command {
                        Some(LinkCommand::Emit(event)) => {
                            let packet = EnginePacket::Message(event.to_packet(&self.namespace));
                            if let Err(e) = send_packet(&mut ws_write, &packet).await {
                                warn!(error = %e, event = event.name(), "Failed to send event");
                                return SessionEnd::Lost(DisconnectReason::TransportError);
                            }
                            trace!(event = event.name(), room_id = %event.room_id(), "Event sent");
                        }

                        Some(LinkCommand::Shutdown) | None => {
                            debug!("Shutdown requested");
                            let goodbye = EnginePacket::Message(SocketPacket::disconnect(self.namespace.as_str()));
                            let _ = send_packet(&mut ws_write, &goodbye).await;
                            let _ = ws_write.close().await;
                            return SessionEnd::Shutdown;
                        }
                    }
                }

                () = &mut heartbeat => {
                    warn!(window_ms = liveness.as_millis() as u64, "No heartbeat from server");
                    return SessionEnd::Lost(DisconnectReason::PingTimeout);
                }
            }
        }
    }

    /// Routes a Socket.IO packet. Returns `Some` when the session ends.
    fn handle_socket_packet(&self, packet: SocketPacket) -> Option<SessionEnd> {
        if packet.namespace != self.namespace {
            trace!(namespace = %packet.namespace, "Ignoring packet for other namespace");
            return None;
        }

        match packet.kind {
            SocketPacketKind::Event { .. } => {
                if let Some(event) = InboundEvent::from_packet(packet) {
                    trace!(event = %event.name, "Event received");
                    (self.sink)(WireEvent::Event(event));
                }
                None
            }

            SocketPacketKind::Disconnect => {
                Some(SessionEnd::Lost(DisconnectReason::ServerDisconnect))
            }

            SocketPacketKind::ConnectError(data) => {
                (self.sink)(WireEvent::Error(rejection_message(&data)));
                None
            }

            SocketPacketKind::Connect(_) | SocketPacketKind::Ack { .. } => {
                trace!("Ignoring control packet");
                None
            }
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Opens the websocket and completes the Engine.IO and Socket.IO handshakes.
async fn establish(
    url: &Url,
    namespace: &str,
    auth: Option<Value>,
) -> Result<(WsStream, OpenHandshake)> {
    debug!(host = url.host_str().unwrap_or_default(), path = url.path(), "Opening websocket");

    let (mut ws_stream, _) = connect_async(url.as_str()).await.map_err(|e| {
        Error::connection(format!(
            "{}{}: {e}",
            url.host_str().unwrap_or_default(),
            url.path()
        ))
    })?;

    let handshake = loop {
        match next_packet(&mut ws_stream).await? {
            EnginePacket::Open(handshake) => break handshake,
            other => trace!(?other, "Ignoring packet before open"),
        }
    };

    let connect = EnginePacket::Message(SocketPacket::connect(namespace, auth));
    ws_stream.send(Message::Text(connect.encode()?.into())).await?;

    loop {
        match next_packet(&mut ws_stream).await? {
            EnginePacket::Ping => {
                ws_stream
                    .send(Message::Text(EnginePacket::Pong.encode()?.into()))
                    .await?;
            }

            EnginePacket::Message(packet) if packet.namespace == namespace => match packet.kind {
                SocketPacketKind::Connect(_) => break,
                SocketPacketKind::ConnectError(data) => {
                    return Err(Error::connect_rejected(rejection_message(&data)));
                }
                _ => trace!("Ignoring packet before connect"),
            },

            EnginePacket::Close => return Err(Error::ConnectionClosed),

            other => trace!(?other, "Ignoring packet before connect"),
        }
    }

    info!(sid = %handshake.sid, namespace, "Socket.IO session established");

    Ok((ws_stream, handshake))
}

/// Reads the next Engine.IO packet, skipping non-text frames.
async fn next_packet(ws_stream: &mut WsStream) -> Result<EnginePacket> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => return EnginePacket::decode(text.as_str()),
            Some(Ok(Message::Close(_))) | None => return Err(Error::ConnectionClosed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Encodes and sends one packet.
async fn send_packet(ws_write: &mut WsWrite, packet: &EnginePacket) -> Result<()> {
    let text = packet.encode()?;
    ws_write.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Waits for a shutdown request, dropping emits queued meanwhile.
async fn drain_until_shutdown(commands: &mut mpsc::UnboundedReceiver<LinkCommand>) {
    loop {
        match commands.recv().await {
            Some(LinkCommand::Emit(event)) => {
                trace!(event = event.name(), "Dropping event while disconnected");
            }
            Some(LinkCommand::Shutdown) | None => return,
        }
    }
}

/// Extracts the reason from a CONNECT_ERROR payload.
fn rejection_message(data: &Value) -> String {
    data.get("message")
        .and_then(Value::as_str)
        .map_or_else(|| data.to_string(), str::to_string)
}

// ============================================================================
// Tests
// ============================================================================
