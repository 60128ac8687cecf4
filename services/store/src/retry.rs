//! Transient-storage retry helper
//!
//! Retries ONLY connection-loss class failures (`StoreError::Transient`)
//! with a linearly multiplied delay. This budget is entirely separate
//! from the upstream rate-limit backoff in the ingestion client; the two
//! must never share attempt counts.

use std::time::Duration;
use tracing::warn;

use crate::StoreError;

/// Retry policy for transient storage failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; attempt N waits `base_delay × N`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Run `op`, retrying transient failures per the policy.
///
/// Any non-transient error propagates immediately. Once the budget is
/// exhausted the last transient error surfaces to the caller.
pub async fn with_retry<T, F>(policy: &RetryPolicy, table: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(StoreError::Transient(detail)) if attempt < policy.max_attempts => {
                let delay = policy.base_delay * attempt;
                warn!(table, attempt, %detail, delay_ms = delay.as_millis() as u64,
                    "transient storage failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = with_retry(&policy(), "payouts", || {
            calls += 1;
            if calls < 3 {
                Err(StoreError::Transient("connection reset".to_string()))
            } else {
                Ok(calls)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_surfaces_error() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(&policy(), "payouts", || {
            calls += 1;
            Err(StoreError::Transient("down".to_string()))
        })
        .await;
        assert_eq!(calls, 3);
        assert!(matches!(result, Err(StoreError::Transient(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(&policy(), "matches", || {
            calls += 1;
            Err(StoreError::Conflict("taken".to_string()))
        })
        .await;
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }
}
