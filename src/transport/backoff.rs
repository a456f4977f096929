//! Reconnection delay policy.
//!
//! Defaults follow the Socket.IO client: unlimited attempts, 1s base
//! delay doubling per attempt, capped at 5s, with ±50% randomization.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first reconnection attempt.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound of any reconnection delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Fraction of the delay that may be added or removed at random.
const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// When and how often a lost connection is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Reconnect at all.
    pub enabled: bool,

    /// Attempts before giving up (`None` = unlimited).
    pub max_attempts: Option<u32>,

    /// Delay before the first attempt.
    pub base_delay: Duration,

    /// Delay cap.
    pub max_delay: Duration,

    /// Jitter in `0.0..=1.0`.
    pub randomization_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectPolicy {
    /// Creates the default policy.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            max_attempts: None,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
        }
    }

    /// Creates a policy that never reconnects.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Limits the number of attempts.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets base and maximum delay.
    #[inline]
    #[must_use]
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Sets the jitter factor, clamped to `0.0..=1.0`.
    #[inline]
    #[must_use]
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Returns `true` if attempt number `attempt` (1-based) may run.
    #[inline]
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Delay before attempt `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let mut ms = base * 2f64.powi(attempt.min(31) as i32);

        let factor = self.randomization_factor.clamp(0.0, 1.0);
        if factor > 0.0 {
            let roll: f64 = rand::random();
            let deviation = (roll * factor * ms).floor();
            if ((roll * 10.0).floor() as u64) & 1 == 0 {
                ms -= deviation;
            } else {
                ms += deviation;
            }
        }

        Duration::from_millis(ms.clamp(0.0, max) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
