//! In-memory connector for unit tests.
//!
//! Every [`Connector::open`] call is recorded as a [`MockSession`]; tests
//! drive the chat layer by firing [`WireEvent`]s into a session's sink and
//! inspect what was emitted on its link.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::OutboundEvent;

use super::{ConnectRequest, Connector, EventSink, Link, WireEvent};

// ============================================================================
// MockConnector
// ============================================================================

/// Records opened sessions.
#[derive(Default)]
pub(crate) struct MockConnector {
    sessions: Mutex<Vec<MockSession>>,
    /// Report `connect` from inside `open`.
    connect_on_open: bool,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connector whose sessions report `connect` before `open` returns.
    pub(crate) fn connecting_on_open() -> Arc<Self> {
        Arc::new(Self {
            connect_on_open: true,
            ..Self::default()
        })
    }

    /// Number of `open` calls so far.
    pub(crate) fn opened(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Session opened by call number `index` (0-based).
    pub(crate) fn session(&self, index: usize) -> MockSession {
        self.sessions.lock()[index].clone()
    }

    /// Most recently opened session.
    pub(crate) fn latest(&self) -> MockSession {
        let sessions = self.sessions.lock();
        sessions.last().cloned().expect("no session opened")
    }
}

impl Connector for MockConnector {
    fn open(&self, request: ConnectRequest, sink: EventSink) -> Result<Box<dyn Link>> {
        let link = Arc::new(MockLinkState::default());
        self.sessions.lock().push(MockSession {
            request,
            sink: Arc::clone(&sink),
            link: Arc::clone(&link),
        });
        if self.connect_on_open {
            sink(WireEvent::Connected);
        }
        Ok(Box::new(MockLink(link)))
    }
}

// ============================================================================
// MockSession
// ============================================================================

/// One recorded `open` call.
#[derive(Clone)]
pub(crate) struct MockSession {
    pub(crate) request: ConnectRequest,
    sink: EventSink,
    link: Arc<MockLinkState>,
}

impl MockSession {
    /// Delivers `event` as if the wire produced it.
    pub(crate) fn fire(&self, event: WireEvent) {
        (self.sink)(event);
    }

    /// Events emitted on this session's link.
    pub(crate) fn emitted(&self) -> Vec<OutboundEvent> {
        self.link.emitted.lock().clone()
    }

    /// Whether the link was closed.
    pub(crate) fn is_closed(&self) -> bool {
        self.link.closed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockLink
// ============================================================================

#[derive(Default)]
struct MockLinkState {
    emitted: Mutex<Vec<OutboundEvent>>,
    closed: AtomicBool,
}

struct MockLink(Arc<MockLinkState>);

impl Link for MockLink {
    fn emit(&self, event: &OutboundEvent) -> Result<()> {
        if self.0.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.0.emitted.lock().push(event.clone());
        Ok(())
    }

    fn close(&self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }
}
