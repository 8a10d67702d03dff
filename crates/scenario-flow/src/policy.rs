//! Bounded retry policy.

use std::time::Duration;

use visor_core_types::ErrorKind;

/// Retry budget for one step. The count bounds total attempts, not
/// retries: `max_attempts = 3` means at most two retries.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * backoff_unit`.
    pub backoff_unit: Duration,
    /// Hard cap on any single delay.
    pub backoff_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_millis(500),
            backoff_ceiling: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Whether a failed attempt number `attempt` (1-based) should be
    /// retried given the failure's kind.
    pub fn should_retry(&self, attempt: u32, kind: ErrorKind) -> bool {
        attempt < self.max_attempts && kind.is_retryable()
    }

    /// Linear backoff before the next attempt, capped at the ceiling.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff_unit.saturating_mul(attempt);
        delay.min(self.backoff_ceiling)
    }
}
