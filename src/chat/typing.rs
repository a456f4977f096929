//! Typing indicator helpers.
//!
//! - [`TypingDebouncer`] turns a stream of keystrokes into one
//!   `typing_start` and, after an idle period, one `typing_stop`.
//! - [`TypingRoster`] folds received [`TypingStatus`] values into the set
//!   of people currently typing, latest value per `(room, user)` winning.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::identifiers::{RoomId, UserId};

use super::model::TypingStatus;

// ============================================================================
// Constants
// ============================================================================

/// Idle time after the last keystroke before typing is considered stopped.
pub const DEFAULT_TYPING_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// TypingDebouncer
// ============================================================================

/// One typing burst in one room.
struct ActiveTyping {
    /// Identifies the current idle timer.
    token: u64,
    /// Idle timer, absent without a runtime.
    timer: Option<JoinHandle<()>>,
}

impl ActiveTyping {
    fn abort(self) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
    }
}

/// Per-room keystroke debouncer.
pub(crate) struct TypingDebouncer {
    idle_timeout: Duration,
    active: Mutex<FxHashMap<RoomId, ActiveTyping>>,
    next_token: AtomicU64,
}

impl TypingDebouncer {
    /// Creates a debouncer with the given idle timeout.
    pub(crate) fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            active: Mutex::new(FxHashMap::default()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Records a keystroke in `room` and re-arms its idle timer.
    ///
    /// When the timer fires, `on_idle` receives the timer token; pass it to
    /// [`expire`](Self::expire) to end the burst. Returns `true` if this
    /// keystroke started a new burst.
    pub(crate) fn keystroke<F>(&self, room: &RoomId, on_idle: F) -> bool
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let idle_timeout = self.idle_timeout;

        let timer = match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                tokio::time::sleep(idle_timeout).await;
                on_idle(token);
            })),
            Err(_) => {
                warn!(room_id = %room, "No tokio runtime, typing will not stop on its own");
                None
            }
        };

        let previous = self
            .active
            .lock()
            .insert(room.clone(), ActiveTyping { token, timer });

        match previous {
            Some(previous) => {
                previous.abort();
                trace!(room_id = %room, token, "Typing timer re-armed");
                false
            }
            None => {
                trace!(room_id = %room, token, "Typing burst started");
                true
            }
        }
    }

    /// Ends the burst in `room` if `token` is still its current timer.
    pub(crate) fn expire(&self, room: &RoomId, token: u64) -> bool {
        let mut active = self.active.lock();
        if active.get(room).is_some_and(|entry| entry.token == token) {
            active.remove(room);
            true
        } else {
            false
        }
    }

    /// Ends the burst in `room` now. Returns `true` if one was active.
    pub(crate) fn cancel(&self, room: &RoomId) -> bool {
        let removed = self.active.lock().remove(room);
        removed.map(ActiveTyping::abort).is_some()
    }

    /// Ends every burst without notification.
    pub(crate) fn cancel_all(&self) {
        let drained: Vec<ActiveTyping> = self.active.lock().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            entry.abort();
        }
    }

    /// Returns `true` if a burst is active in `room`.
    #[cfg(test)]
    pub(crate) fn is_active(&self, room: &RoomId) -> bool {
        self.active.lock().contains_key(room)
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// ============================================================================
// TypingRoster
// ============================================================================

/// Who is typing where.
///
/// Feed it every [`TypingStatus`] from
/// [`ChatTransport::on_typing`](super::ChatTransport::on_typing).
///
/// # Example
///
/// ```
/// use counsel_chat::{RoomId, TypingRoster, TypingStatus, UserId};
///
/// let mut roster = TypingRoster::new();
/// roster.apply(&TypingStatus {
///     user_id: UserId::from(3),
///     user_name: "Ann".into(),
///     is_typing: true,
///     room_id: RoomId::from(9),
/// });
///
/// assert_eq!(roster.typing_in(&RoomId::from(9)), vec!["Ann"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypingRoster {
    typing: FxHashMap<(RoomId, UserId), String>,
}

impl TypingRoster {
    /// Creates an empty roster.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a status. Returns `true` if the roster changed.
    pub fn apply(&mut self, status: &TypingStatus) -> bool {
        let key = (status.room_id.clone(), status.user_id.clone());

        if status.is_typing {
            let previous = self.typing.insert(key, status.user_name.clone());
            previous.as_deref() != Some(status.user_name.as_str())
        } else {
            self.typing.remove(&key).is_some()
        }
    }

    /// Returns `true` if `user` is typing in `room`.
    #[inline]
    #[must_use]
    pub fn is_typing(&self, room: &RoomId, user: &UserId) -> bool {
        self.typing.contains_key(&(room.clone(), user.clone()))
    }

    /// Display names of everyone typing in `room`, sorted.
    #[must_use]
    pub fn typing_in(&self, room: &RoomId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .typing
            .iter()
            .filter(|((typing_room, _), _)| typing_room == room)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Forgets everyone in `room`.
    pub fn clear_room(&mut self, room: &RoomId) {
        self.typing.retain(|(typing_room, _), _| typing_room != room);
    }

    /// Returns `true` if nobody is typing anywhere.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.typing.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
