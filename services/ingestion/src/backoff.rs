//! Rate-limit backoff policy
//!
//! Governs retries of upstream calls that answered HTTP 429: exponential
//! delay (base, doubling) with a capped attempt count, overridden by a
//! server-supplied Retry-After when one is present. Any other failure is
//! terminal and never retried here.

use std::time::Duration;

/// Exponential backoff for HTTP 429 responses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry; attempt N waits `base_delay × 2^(N−1)`
    pub base_delay: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying after failed attempt `attempt` (1-based).
    ///
    /// A server Retry-After always wins over the computed delay.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(server_delay) = retry_after {
            return server_delay;
        }
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(doublings)
    }

    /// Whether another retry is allowed after failed attempt `attempt`
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
