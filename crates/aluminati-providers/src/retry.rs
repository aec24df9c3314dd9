//! Backoff policy for transient provider failures.

use std::time::Duration;

use rand::Rng;

use aluminati_core::config::RetryConfig;

use crate::error::ProviderError;

/// Exponential backoff with jitter: `base * 2^attempt`, capped at `max_delay`,
/// plus up to 25% random jitter. Rate-limit hints raise the delay floor, but
/// never above `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Total number of attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (0-based) after `err`.
    pub fn delay_for(&self, attempt: u32, err: &ProviderError) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = if exp.is_zero() {
            0
        } else {
            rand::rng().random_range(0..=exp.as_millis() as u64 / 4)
        };
        let delay = exp + Duration::from_millis(jitter_ms);
        match err.retry_after() {
            Some(floor) => delay.max(floor.min(self.max_delay)),
            None => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}
