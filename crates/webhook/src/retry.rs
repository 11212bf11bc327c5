//! Retry policy for webhook delivery.

use rand::Rng;
use std::time::Duration;

/// Fixed attempt budget with uniformly jittered waits between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first one.
    pub max_attempts: u32,

    /// Lower bound of the wait between attempts (inclusive).
    pub min_wait: Duration,

    /// Upper bound of the wait between attempts (exclusive).
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            min_wait: Duration::from_millis(500),
            max_wait: Duration::from_millis(3000),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt follows attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Draw the wait before the next attempt from `[min_wait, max_wait)`.
    pub fn next_delay(&self) -> Duration {
        let min = self.min_wait.as_micros() as u64;
        let max = self.max_wait.as_micros() as u64;
        if max <= min {
            return self.min_wait;
        }
        Duration::from_micros(rand::rng().random_range(min..max))
    }
}
