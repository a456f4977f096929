//! Chat transport coordinator.
//!
//! [`ChatTransport`] owns at most one connection at a time, remembers the
//! room and user it was connected with, and turns wire events into
//! listener notifications.
//!
//! # Connection generations
//!
//! Every [`connect`](ChatTransport::connect) and
//! [`disconnect`](ChatTransport::disconnect) starts a new generation. Each
//! connection's events are tagged with the generation that opened it, and
//! events from older generations are dropped, so a superseded connection
//! can never notify listeners.
//!
//! # Example
//!
//! ```no_run
//! use counsel_chat::{ChatTransport, MessageDraft};
//!
//! # async fn example() -> counsel_chat::Result<()> {
//! let chat = ChatTransport::builder()
//!     .server_url("https://chat.example.org")
//!     .build()?;
//!
//! let _messages = chat.on_message(|message| {
//!     println!("{}: {}", message.sender_id, message.message);
//! });
//!
//! chat.connect(9, 42, Some("jwt"));
//! chat.send_message(MessageDraft::new("Hello"));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info, trace, warn};

use crate::identifiers::{RoomId, UserId};
use crate::protocol::OutboundEvent;
use crate::transport::{ConnectRequest, Connector, EventSink, Link, WireEvent};

use super::builder::ChatTransportBuilder;
use super::listeners::{ListenerRegistry, Subscription};
use super::model::{ChatMessage, MessageDraft, RoomEvent, TypingStatus};
use super::normalize::{Notification, normalize, resolve_room};
use super::options::ChatOptions;
use super::typing::TypingDebouncer;

// ============================================================================
// Types
// ============================================================================

/// Connection state as seen by listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LinkState {
    /// No connection, or the last one ended.
    #[default]
    Disconnected,
    /// `connect` was called; the wire has not reported yet.
    Connecting,
    /// The wire reported `connect`.
    Connected,
}

/// Context recorded by the last `connect`.
#[derive(Default)]
struct Session {
    /// Room joined on every `connect` event.
    room_id: Option<RoomId>,
    /// User the connection was opened for.
    user_id: Option<UserId>,
    /// Active connection.
    link: Option<Box<dyn Link>>,
    /// Current connection generation.
    generation: u64,
    state: LinkState,
}

impl Session {
    #[inline]
    fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Starts a new generation and returns the link it replaces.
    fn supersede(&mut self) -> Option<Box<dyn Link>> {
        self.generation += 1;
        self.link.take()
    }

    /// Emits on the current link. Returns `true` if the event was queued.
    fn emit(&self, event: &OutboundEvent) -> bool {
        let Some(link) = self.link.as_ref() else {
            debug!(event = event.name(), "No connection, dropping event");
            return false;
        };

        match link.emit(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, event = event.name(), "Failed to emit event");
                false
            }
        }
    }

    /// Emits `join_room` for the recorded room once a link is installed.
    fn join_room(&self) {
        let Some(room_id) = self.room_id.clone() else {
            return;
        };
        if self.link.is_none() {
            trace!(%room_id, "Join deferred until the link is installed");
            return;
        }

        debug!(%room_id, "Joining room");
        self.emit(&OutboundEvent::JoinRoom { room_id });
    }
}

/// Internal shared state for the transport.
pub(crate) struct ChatInner {
    /// Validated settings.
    options: ChatOptions,

    /// Opens connections.
    connector: Arc<dyn Connector>,

    /// Current room, user, connection and state.
    session: Mutex<Session>,

    /// Held across a state change and its connection notification.
    transitions: ReentrantMutex<()>,

    messages: ListenerRegistry<ChatMessage>,
    typing: ListenerRegistry<TypingStatus>,
    connection: ListenerRegistry<bool>,
    rooms: ListenerRegistry<RoomEvent>,

    /// Outgoing typing indicator state.
    debouncer: TypingDebouncer,
}

// ============================================================================
// ChatTransport
// ============================================================================

/// Real-time chat connection for one user.
///
/// Cheap to clone; clones share the connection and listeners. Operations
/// never fail: problems are logged and leave the transport disconnected.
#[derive(Clone)]
pub struct ChatTransport {
    /// Shared inner state.
    pub(crate) inner: Arc<ChatInner>,
}

// ============================================================================
// ChatTransport - Display
// ============================================================================

impl fmt::Debug for ChatTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.inner.session.lock();
        f.debug_struct("ChatTransport")
            .field("server_url", &self.inner.options.server_url.as_str())
            .field("room_id", &session.room_id)
            .field("user_id", &session.user_id)
            .field("state", &session.state)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ChatTransport - Public API
// ============================================================================

impl ChatTransport {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ChatTransportBuilder {
        ChatTransportBuilder::new()
    }

    /// Creates a transport from validated options.
    pub(crate) fn new(options: ChatOptions, connector: Arc<dyn Connector>) -> Self {
        let debouncer = TypingDebouncer::new(options.typing_idle_timeout);

        Self {
            inner: Arc::new(ChatInner {
                options,
                connector,
                session: Mutex::new(Session::default()),
                transitions: ReentrantMutex::new(()),
                messages: ListenerRegistry::new(),
                typing: ListenerRegistry::new(),
                connection: ListenerRegistry::new(),
                rooms: ListenerRegistry::new(),
                debouncer,
            }),
        }
    }

    /// Returns the settings this transport was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ChatOptions {
        &self.inner.options
    }

    /// Opens a connection for `user_id` in `room_id`.
    ///
    /// Any existing connection is closed first, without a
    /// `connection(false)` notification. `token` travels in the handshake
    /// auth payload and the `token` query parameter. Once connected (and
    /// after every reconnection) the room is joined.
    ///
    /// If the connection cannot be established, listeners receive
    /// `connection(false)`.
    pub fn connect(
        &self,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
        token: Option<&str>,
    ) {
        let room_id = room_id.into();
        let user_id = user_id.into();
        let _transition = self.inner.transitions.lock();

        let (generation, previous) = {
            let mut session = self.inner.session.lock();
            let previous = session.supersede();
            session.room_id = Some(room_id.clone());
            session.user_id = Some(user_id.clone());
            session.state = LinkState::Connecting;
            (session.generation, previous)
        };

        self.inner.debouncer.cancel_all();
        if let Some(link) = previous {
            link.close();
            debug!("Closed previous connection");
        }

        let request = ConnectRequest {
            token: token.map(str::to_string),
        };
        let link = match self.inner.connector.open(request, self.sink_for(generation)) {
            Ok(link) => link,
            Err(e) => {
                error!(error = %e, %room_id, "Failed to open chat connection");
                self.inner.settle_failed(generation);
                return;
            }
        };

        let mut session = self.inner.session.lock();
        if session.generation != generation {
            drop(session);
            link.close();
            debug!(generation, "Connection superseded while opening");
            return;
        }

        session.link = Some(link);
        // The wire may already have reported `connect`.
        if session.is_connected() {
            session.join_room();
        }
        info!(%room_id, %user_id, generation, "Chat connection opening");
    }

    /// Closes the connection. Idempotent.
    ///
    /// Listeners receive `connection(false)` once if the transport was
    /// connected. The recorded room and user are kept.
    pub fn disconnect(&self) {
        let _transition = self.inner.transitions.lock();

        let (link, was_connected) = {
            let mut session = self.inner.session.lock();
            let link = session.supersede();
            let was_connected = session.is_connected();
            session.state = LinkState::Disconnected;
            (link, was_connected)
        };

        self.inner.debouncer.cancel_all();
        if let Some(link) = link {
            link.close();
            debug!("Chat connection closed");
        }

        if was_connected {
            info!("Chat disconnected");
            self.inner.connection.notify(&false);
        }
    }

    /// Sends a chat message.
    ///
    /// Goes to the draft's room, or the current room when the draft has
    /// none. Dropped when not connected or no room is known.
    pub fn send_message(&self, draft: MessageDraft) {
        let session = self.inner.session.lock();
        if !session.is_connected() {
            debug!("Not connected, dropping message");
            return;
        }

        let Some(room_id) = resolve_room(draft.room_id, session.room_id.as_ref()) else {
            warn!("No room for outgoing message, dropping it");
            return;
        };

        session.emit(&OutboundEvent::SendMessage {
            room_id,
            content: draft.message,
        });
    }

    /// Sends `typing_start` or `typing_stop` for `room_id`.
    ///
    /// No-op when not connected.
    pub fn send_typing_status(&self, is_typing: bool, room_id: impl Into<RoomId>) {
        let room_id = room_id.into();
        let session = self.inner.session.lock();
        if !session.is_connected() {
            trace!("Not connected, dropping typing status");
            return;
        }

        let event = if is_typing {
            OutboundEvent::TypingStart { room_id }
        } else {
            OutboundEvent::TypingStop { room_id }
        };
        session.emit(&event);
    }

    /// Reports a keystroke in `room_id`.
    ///
    /// The first keystroke of a burst sends `typing_start`; `typing_stop`
    /// follows once no keystroke arrived for the typing idle timeout.
    /// No-op when not connected.
    pub fn notify_typing(&self, room_id: impl Into<RoomId>) {
        if !self.is_connected() {
            return;
        }

        let room_id = room_id.into();
        let weak: Weak<ChatInner> = Arc::downgrade(&self.inner);
        let timer_room = room_id.clone();

        let started = self.inner.debouncer.keystroke(&room_id, move |token| {
            if let Some(inner) = weak.upgrade()
                && inner.debouncer.expire(&timer_room, token)
            {
                trace!(room_id = %timer_room, "Typing idle");
                inner.emit(&OutboundEvent::TypingStop { room_id: timer_room });
            }
        });

        if started {
            self.inner.emit(&OutboundEvent::TypingStart { room_id });
        }
    }

    /// Ends a typing burst in `room_id` now.
    ///
    /// Sends `typing_stop` only if a burst was active.
    pub fn stop_typing(&self, room_id: impl Into<RoomId>) {
        let room_id = room_id.into();
        if self.inner.debouncer.cancel(&room_id) && self.is_connected() {
            self.inner.emit(&OutboundEvent::TypingStop { room_id });
        }
    }

    /// Registers a listener for new messages.
    pub fn on_message<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.inner.messages.subscribe(listener)
    }

    /// Registers a listener for typing status changes.
    pub fn on_typing<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TypingStatus) + Send + Sync + 'static,
    {
        self.inner.typing.subscribe(listener)
    }

    /// Registers a listener for connection state changes.
    pub fn on_connection_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner
            .connection
            .subscribe(move |connected: &bool| listener(*connected))
    }

    /// Registers a listener for room presence changes.
    pub fn on_room_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RoomEvent) + Send + Sync + 'static,
    {
        self.inner.rooms.subscribe(listener)
    }

    /// Returns `true` while a connection is established.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.session.lock().is_connected()
    }

    /// Room recorded by the last `connect`.
    #[must_use]
    pub fn current_room(&self) -> Option<RoomId> {
        self.inner.session.lock().room_id.clone()
    }

    /// User recorded by the last `connect`.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.inner.session.lock().user_id.clone()
    }

    /// Total number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.messages.len()
            + self.inner.typing.len()
            + self.inner.connection.len()
            + self.inner.rooms.len()
    }
}

// ============================================================================
// ChatTransport - Internal
// ============================================================================

impl ChatTransport {
    /// Creates the event sink for one connection generation.
    fn sink_for(&self, generation: u64) -> EventSink {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_wire_event(generation, event);
            }
        })
    }
}

impl ChatInner {
    /// Applies one wire event from connection `generation`.
    fn handle_wire_event(&self, generation: u64, event: WireEvent) {
        if let WireEvent::Event(event) = event {
            let room_id = {
                let session = self.session.lock();
                if session.generation != generation {
                    trace!(generation, event = %event.name, "Dropping event from superseded connection");
                    return;
                }
                session.room_id.clone()
            };

            if let Some(notification) = normalize(event.parse(), room_id.as_ref()) {
                self.dispatch(&notification);
            }
            return;
        }

        let _transition = self.transitions.lock();
        let mut session = self.session.lock();
        if session.generation != generation {
            trace!(
                generation,
                current = session.generation,
                event = event.name(),
                "Dropping event from superseded connection"
            );
            return;
        }

        match event {
            WireEvent::Connected => {
                session.state = LinkState::Connected;
                session.join_room();
                drop(session);

                info!("Chat connected");
                self.connection.notify(&true);
            }

            WireEvent::Disconnected(reason) => {
                let changed = session.state != LinkState::Disconnected;
                session.state = LinkState::Disconnected;
                drop(session);

                self.debouncer.cancel_all();
                if changed {
                    info!(%reason, "Chat disconnected");
                    self.connection.notify(&false);
                }
            }

            WireEvent::Error(message) => {
                drop(session);
                warn!(error = %message, "Chat connection error");
                self.settle_failed(generation);
            }

            WireEvent::ConnectTimeout => {
                drop(session);
                warn!("Chat connection timed out");
                self.settle_failed(generation);
            }

            WireEvent::ReconnectAttempt(attempt) => debug!(attempt, "Reconnecting"),

            WireEvent::ReconnectError(message) => {
                drop(session);
                warn!(error = %message, "Chat reconnection attempt failed");
                self.settle_failed(generation);
            }

            WireEvent::ReconnectFailed => {
                drop(session);
                error!("Chat reconnection gave up");
                self.settle_failed(generation);
            }

            WireEvent::Event(_) => {}
        }
    }

    /// Reports a failed establishment of connection `generation`.
    ///
    /// Only a pending connection turns into `connection(false)`; errors on
    /// an established or already lost connection change nothing.
    fn settle_failed(&self, generation: u64) {
        let _transition = self.transitions.lock();
        {
            let mut session = self.session.lock();
            if session.generation != generation || session.state != LinkState::Connecting {
                return;
            }
            session.state = LinkState::Disconnected;
        }

        info!("Chat connection could not be established");
        self.connection.notify(&false);
    }

    /// Delivers a notification to its listeners.
    fn dispatch(&self, notification: &Notification) {
        let delivered = match notification {
            Notification::Message(message) => self.messages.notify(message),
            Notification::Typing(status) => self.typing.notify(status),
            Notification::Room(event) => self.rooms.notify(event),
        };
        trace!(delivered, "Notification dispatched");
    }

    /// Emits on the current link. Returns `true` if the event was queued.
    fn emit(&self, event: &OutboundEvent) -> bool {
        self.session.lock().emit(event)
    }
}

impl Drop for ChatInner {
    fn drop(&mut self) {
        if let Some(link) = self.session.get_mut().link.take() {
            link.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::{Value, json};

    use crate::chat::model::RoomEventKind;
    use crate::error::{Error, Result};
    use crate::identifiers::MessageId;
    use crate::protocol::InboundEvent;
    use crate::transport::DisconnectReason;
    use crate::transport::mock::MockConnector;

    fn transport(connector: &Arc<MockConnector>) -> ChatTransport {
        transport_with_idle(connector, Duration::from_secs(3))
    }

    fn transport_with_idle(connector: &Arc<MockConnector>, idle: Duration) -> ChatTransport {
        let options = ChatOptions::new(url::Url::parse("http://localhost:5000").expect("url"))
            .with_typing_idle_timeout(idle);
        ChatTransport::new(options, Arc::clone(connector) as Arc<dyn Connector>)
    }

    fn event(name: &str, payload: Value) -> WireEvent {
        WireEvent::Event(InboundEvent::new(name, payload))
    }

    fn record_messages(chat: &ChatTransport) -> Arc<Mutex<Vec<ChatMessage>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = chat.on_message(move |message| sink.lock().push(message.clone()));
        seen
    }

    fn record_connection(chat: &ChatTransport) -> Arc<Mutex<Vec<bool>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = chat.on_connection_change(move |connected| sink.lock().push(connected));
        seen
    }

    fn joins(events: &[OutboundEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, OutboundEvent::JoinRoom { .. }))
            .count()
    }

    #[test]
    fn test_connect_records_context_and_token() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        chat.connect(9, 42, Some("jwt"));

        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.latest().request.token.as_deref(), Some("jwt"));
        assert_eq!(chat.current_room(), Some(RoomId::from(9)));
        assert_eq!(chat.current_user(), Some(UserId::from(42)));
        assert!(!chat.is_connected());
    }

    #[test]
    fn test_unsubscribing_one_listener_stops_only_it() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        let a = {
            let first = Arc::clone(&first);
            chat.on_connection_change(move |_| *first.lock() += 1)
        };
        let _b = {
            let second = Arc::clone(&second);
            chat.on_connection_change(move |_| *second.lock() += 1)
        };

        assert!(a.unsubscribe());
        chat.connect(9, 1, None);
        connector.latest().fire(WireEvent::Connected);

        assert_eq!(*first.lock(), 0);
        assert_eq!(*second.lock(), 1);
        assert_eq!(chat.listener_count(), 1);
    }

    #[test]
    fn test_new_message_is_normalized() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let seen = record_messages(&chat);

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);
        session.fire(event(
            "new_message",
            json!({ "message": {
                "id": 1, "message": "hi", "senderId": 2,
                "senderName": "Bob", "createdAt": "T", "roomId": 9
            }}),
        ));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            ChatMessage {
                id: MessageId::from(1),
                message: "hi".into(),
                sender_id: UserId::from(2),
                user_name: Some("Bob".into()),
                avatar: None,
                avatar_color: None,
                created_at: "T".into(),
                room_id: RoomId::from(9),
            }
        );
    }

    #[test]
    fn test_message_without_room_uses_current_room() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let seen = record_messages(&chat);

        chat.connect(9, 1, None);
        connector.latest().fire(event(
            "new_message",
            json!({ "message": { "id": 1, "message": "hi", "senderId": 2, "createdAt": "T" } }),
        ));

        assert_eq!(seen.lock()[0].room_id, RoomId::from(9));
    }

    #[test]
    fn test_send_before_connect_event_is_dropped() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        chat.connect(9, 1, None);
        chat.send_message(MessageDraft::new("too early"));
        chat.send_typing_status(true, 9);

        assert!(connector.latest().emitted().is_empty());
    }

    #[test]
    fn test_connect_event_joins_room_exactly_once() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);

        assert_eq!(
            session.emitted(),
            vec![OutboundEvent::JoinRoom {
                room_id: RoomId::from(9)
            }]
        );
    }

    #[test]
    fn test_second_connect_discards_first() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let messages = record_messages(&chat);
        let states = record_connection(&chat);

        chat.connect(9, 1, None);
        let first = connector.session(0);
        first.fire(WireEvent::Connected);

        chat.connect(10, 1, None);
        assert!(first.is_closed());
        assert!(!chat.is_connected());

        first.fire(event(
            "new_message",
            json!({ "message": { "id": 1, "message": "stale", "senderId": 2 } }),
        ));
        first.fire(WireEvent::Disconnected(DisconnectReason::ClientDisconnect));
        first.fire(WireEvent::Connected);

        assert!(messages.lock().is_empty());
        assert_eq!(*states.lock(), vec![true]);
        assert_eq!(joins(&first.emitted()), 1);

        let second = connector.session(1);
        second.fire(WireEvent::Connected);
        assert_eq!(
            second.emitted(),
            vec![OutboundEvent::JoinRoom {
                room_id: RoomId::from(10)
            }]
        );
        assert_eq!(*states.lock(), vec![true, true]);
    }

    #[test]
    fn test_reconnect_rejoins_room() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);
        session.fire(WireEvent::Disconnected(DisconnectReason::TransportClose));
        session.fire(WireEvent::ReconnectAttempt(1));
        session.fire(WireEvent::Connected);

        assert_eq!(joins(&session.emitted()), 2);
        assert_eq!(*states.lock(), vec![true, false, true]);
        assert_eq!(connector.opened(), 1);
    }

    #[test]
    fn test_join_precedes_sends_from_connection_listener() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        let sender = chat.clone();
        let _sub = chat.on_connection_change(move |connected| {
            if connected {
                sender.send_message(MessageDraft::new("hello again"));
            }
        });

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);

        let emitted = session.emitted();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].name(), "join_room");
        assert_eq!(emitted[1].name(), "send_message");
    }

    #[test]
    fn test_send_message_room_selection() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);

        chat.send_message(MessageDraft::new("current"));
        chat.send_message(MessageDraft::new("explicit").in_room("side"));
        chat.send_message(MessageDraft::new("blank").in_room(0));

        let emitted = session.emitted();
        assert_eq!(
            emitted[1..],
            [
                OutboundEvent::SendMessage {
                    room_id: RoomId::from(9),
                    content: "current".into()
                },
                OutboundEvent::SendMessage {
                    room_id: RoomId::from("side"),
                    content: "explicit".into()
                },
                OutboundEvent::SendMessage {
                    room_id: RoomId::from(9),
                    content: "blank".into()
                },
            ]
        );
    }

    #[test]
    fn test_disconnect_notifies_once() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.disconnect();
        assert!(states.lock().is_empty());

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);

        chat.disconnect();
        chat.disconnect();
        session.fire(WireEvent::Disconnected(DisconnectReason::ClientDisconnect));

        assert!(session.is_closed());
        assert!(!chat.is_connected());
        assert_eq!(*states.lock(), vec![true, false]);
        assert_eq!(chat.current_room(), Some(RoomId::from(9)));

        chat.send_message(MessageDraft::new("after"));
        assert_eq!(session.emitted().len(), 1);
    }

    #[test]
    fn test_typing_status_events() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = chat.on_typing(move |status| sink.lock().push(status.clone()));

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);
        session.fire(event("user_typing", json!({ "userId": 2, "userName": "Bob" })));
        session.fire(event(
            "user_stopped_typing",
            json!({ "userId": 2, "userName": "Bob", "roomId": 9 }),
        ));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_typing);
        assert!(!seen[1].is_typing);
        assert_eq!(seen[0].room_id, RoomId::from(9));

        chat.send_typing_status(true, 9);
        chat.send_typing_status(false, 9);
        let emitted = session.emitted();
        assert_eq!(emitted[1].name(), "typing_start");
        assert_eq!(emitted[2].name(), "typing_stop");
    }

    #[test]
    fn test_room_events_are_dispatched() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = chat.on_room_event(move |event| sink.lock().push(event.kind));

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(event("joined_room", json!({ "roomId": 9 })));
        session.fire(event("user_left_room", json!({ "userId": 5 })));
        session.fire(event("test_message", json!("hello")));

        assert_eq!(
            *seen.lock(),
            vec![RoomEventKind::Joined, RoomEventKind::UserLeft]
        );
    }

    #[tokio::test]
    async fn test_notify_typing_debounces() {
        let connector = MockConnector::new();
        let chat = transport_with_idle(&connector, Duration::from_millis(60));

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);

        chat.notify_typing(9);
        chat.notify_typing(9);
        chat.notify_typing(9);

        let names = |events: Vec<OutboundEvent>| -> Vec<&'static str> {
            events.iter().map(OutboundEvent::name).collect()
        };
        assert_eq!(names(session.emitted()), vec!["join_room", "typing_start"]);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            names(session.emitted()),
            vec!["join_room", "typing_start", "typing_stop"]
        );
    }

    #[tokio::test]
    async fn test_stop_typing_sends_stop_once() {
        let connector = MockConnector::new();
        let chat = transport_with_idle(&connector, Duration::from_secs(10));

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);

        chat.stop_typing(9);
        chat.notify_typing(9);
        chat.stop_typing(9);
        chat.stop_typing(9);

        let typing: Vec<_> = session.emitted().into_iter().skip(1).collect();
        assert_eq!(
            typing,
            vec![
                OutboundEvent::TypingStart {
                    room_id: RoomId::from(9)
                },
                OutboundEvent::TypingStop {
                    room_id: RoomId::from(9)
                },
            ]
        );
    }

    #[test]
    fn test_notify_typing_when_disconnected_is_noop() {
        let connector = MockConnector::new();
        let chat = transport(&connector);

        chat.connect(9, 1, None);
        chat.notify_typing(9);

        assert!(connector.latest().emitted().is_empty());
    }

    struct FailingConnector;

    impl Connector for FailingConnector {
        fn open(&self, _: ConnectRequest, _: EventSink) -> Result<Box<dyn Link>> {
            Err(Error::runtime("no runtime"))
        }
    }

    #[test]
    fn test_connector_failure_leaves_transport_disconnected() {
        let options = ChatOptions::new(url::Url::parse("http://localhost").expect("url"));
        let chat = ChatTransport::new(options, Arc::new(FailingConnector));
        let states = record_connection(&chat);

        chat.connect(9, 1, None);
        chat.send_message(MessageDraft::new("nowhere"));

        assert!(!chat.is_connected());
        assert_eq!(*states.lock(), vec![false]);
        assert_eq!(chat.current_room(), Some(RoomId::from(9)));
    }

    #[test]
    fn test_null_fields_still_notify() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let messages = record_messages(&chat);
        let typing = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&typing);
        let _sub = chat.on_typing(move |status| sink.lock().push(status.clone()));

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);
        session.fire(event(
            "new_message",
            json!({ "message": {
                "id": 1, "message": "hi", "senderId": 2,
                "senderName": "Bob", "createdAt": null, "roomId": 9
            }}),
        ));
        session.fire(event(
            "user_typing",
            json!({ "userId": 2, "userName": null, "roomId": 9 }),
        ));

        let messages = messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].created_at, "");
        assert_eq!(typing.lock().len(), 1);
    }

    #[test]
    fn test_failed_establishment_notifies_false_once() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.connect(9, 1, Some("expired"));
        let session = connector.latest();
        session.fire(WireEvent::Error("invalid token".into()));
        assert_eq!(*states.lock(), vec![false]);

        session.fire(WireEvent::ReconnectAttempt(1));
        session.fire(WireEvent::ReconnectError("refused".into()));
        session.fire(WireEvent::ConnectTimeout);
        session.fire(WireEvent::ReconnectFailed);
        assert_eq!(*states.lock(), vec![false]);
        assert!(!chat.is_connected());
    }

    #[test]
    fn test_connect_timeout_notifies_false() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.connect(9, 1, None);
        connector.latest().fire(WireEvent::ConnectTimeout);

        assert_eq!(*states.lock(), vec![false]);
    }

    #[test]
    fn test_errors_on_established_connection_keep_state() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.connect(9, 1, None);
        let session = connector.latest();
        session.fire(WireEvent::Connected);
        session.fire(WireEvent::Error("unauthorized emit".into()));
        assert!(chat.is_connected());

        session.fire(WireEvent::Disconnected(DisconnectReason::TransportClose));
        session.fire(WireEvent::ReconnectAttempt(1));
        session.fire(WireEvent::ReconnectError("refused".into()));

        assert_eq!(*states.lock(), vec![true, false]);
    }

    #[test]
    fn test_failure_of_superseded_connection_is_ignored() {
        let connector = MockConnector::new();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.connect(9, 1, None);
        let first = connector.session(0);
        chat.connect(10, 1, None);
        first.fire(WireEvent::Error("refused".into()));
        first.fire(WireEvent::ConnectTimeout);

        assert!(states.lock().is_empty());
    }

    #[test]
    fn test_connect_reported_during_open_joins_room() {
        let connector = MockConnector::connecting_on_open();
        let chat = transport(&connector);
        let states = record_connection(&chat);

        chat.connect(9, 1, None);

        assert!(chat.is_connected());
        assert_eq!(*states.lock(), vec![true]);
        assert_eq!(
            connector.latest().emitted(),
            vec![OutboundEvent::JoinRoom {
                room_id: RoomId::from(9)
            }]
        );

        chat.send_message(MessageDraft::new("hello"));
        assert_eq!(connector.latest().emitted().len(), 2);
    }

    #[test]
    fn test_connected_racing_disconnect_settles_disconnected() {
        for _ in 0..500 {
            let connector = MockConnector::new();
            let chat = transport(&connector);
            let states = record_connection(&chat);

            chat.connect(9, 1, None);
            let session = connector.latest();

            std::thread::scope(|scope| {
                scope.spawn(|| session.fire(WireEvent::Connected));
                scope.spawn(|| chat.disconnect());
            });

            assert!(!chat.is_connected());
            let states = states.lock().clone();
            assert!(
                states.is_empty() || states == [true, false],
                "unexpected notifications {states:?}"
            );
        }
    }
}
