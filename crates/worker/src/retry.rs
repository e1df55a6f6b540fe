//! Bounded retry for transient fetch failures

use std::time::Duration;

use contracts::{ContractError, FetchConfig};

/// Fixed-count, fixed-pause retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per item, including the first (at least 1)
    pub max_attempts: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another
    pub fn should_retry(&self, attempt: u32, error: &ContractError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }
}
