//! Retry backoff policy for transient failures.

use chrono::Duration;

/// Default number of delivery attempts before an operation fails
/// terminally.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries, in seconds.
const DEFAULT_BASE_SECS: i64 = 2;

/// Default cap on the retry delay, in seconds.
const DEFAULT_MAX_DELAY_SECS: i64 = 60;

/// Configuration for retry behavior.
///
/// The delay after the n-th failed attempt is `base * n`, capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Maximum number of delivery attempts.
    pub max_retries: u32,
    /// Base delay unit.
    pub base: Duration,
    /// Cap for delay growth.
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Create a policy with the given attempt bound.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base: Duration::seconds(DEFAULT_BASE_SECS),
            max_delay: Duration::seconds(DEFAULT_MAX_DELAY_SECS),
        }
    }

    /// Set the base delay.
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the next attempt, given the number of failed
    /// attempts so far.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let delay = self.base * attempts.max(1) as i32;
        delay.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
