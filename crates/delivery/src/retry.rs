//! Per-record retry and pacing policy.

use std::time::Duration;

use relay_config::DeliveryConfig;

/// Backoff never exceeds this, whatever the base and attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// How the worker retries a single record and paces between records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per record, including the first one. Zero behaves as one.
    pub max_attempts: u32,
    /// Wait after failed attempt `i` is `backoff_base_secs ^ i` seconds.
    pub backoff_base_secs: u64,
    /// Pause between records while more are queued.
    pub inter_record_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2,
            inter_record_delay: Duration::from_secs(2),
        }
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base_secs: config.backoff_base_secs,
            inter_record_delay: Duration::from_secs(config.inter_record_delay_secs),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether a retryable failure on `attempt` (1-indexed) earns another try.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }

    /// Wait between failed `attempt` (1-indexed) and the next one.
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let secs = self.backoff_base_secs.saturating_pow(attempt);
        Duration::from_secs(secs).min(MAX_BACKOFF)
    }
}
