//! Listener registries.
//!
//! One [`ListenerRegistry`] exists per notification kind. Listeners are
//! called synchronously in registration order; the registry lock is never
//! held while a listener runs, so listeners may subscribe, unsubscribe, or
//! call back into the transport.
//!
//! Registration identity is the [`Subscription`], not the callback:
//! registering the same closure twice yields two independent entries.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

// ============================================================================
// Types
// ============================================================================

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Ordered set of callbacks for one notification kind.
pub(crate) struct ListenerRegistry<T: 'static> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ListenerRegistry<T> {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Registers `listener` and returns its handle.
    pub(crate) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut entries = self.entries.lock();
            let id = entries.next_id;
            entries.next_id += 1;
            entries.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        Subscription {
            id,
            detach: Some(Box::new(move || {
                let Some(entries) = weak.upgrade() else {
                    return false;
                };
                let mut entries = entries.lock();
                let before = entries.listeners.len();
                entries.listeners.retain(|(entry_id, _)| *entry_id != id);
                entries.listeners.len() != before
            })),
        }
    }

    /// Calls every listener with `value`. Returns how many were called.
    pub(crate) fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(value);
        }

        snapshot.len()
    }

    /// Number of registered listeners.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().listeners.len()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle to one listener registration.
///
/// Dropping the handle does **not** remove the listener; call
/// [`unsubscribe`](Self::unsubscribe).
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    detach: Option<Box<dyn FnOnce() -> bool + Send + Sync>>,
}

impl Subscription {
    /// Removes exactly this registration.
    ///
    /// Returns `false` if the transport was already dropped.
    pub fn unsubscribe(mut self) -> bool {
        self.detach.take().is_some_and(|detach| detach())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
