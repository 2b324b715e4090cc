//! Retry Policy
//!
//! Exponential backoff with additive jitter for Procore API requests.

use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;

use crate::core::HttpResponse;
use crate::error::{parse_retry_after, ProcoreError};
use crate::types::RetryOptions;

/// Status codes that are retried.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u32,
    pub successful_retries: u32,
    pub failed_operations: u32,
}

/// Decides whether and when a failed attempt is retried.
pub struct RetryPolicy {
    options: RetryOptions,
    stats: Mutex<RetryStats>,
}

impl RetryPolicy {
    /// Create new retry policy.
    pub fn new(options: RetryOptions) -> Self {
        Self {
            options,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    /// Get maximum retries.
    pub fn max_retries(&self) -> u32 {
        self.options.max_retries
    }

    /// Delay before retry number `retry` (1-based).
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let base = self.options.base_delay.as_millis() as f64;
        let delay = if self.options.use_exponential_backoff {
            base * self
                .options
                .backoff_multiplier
                .powi(retry.saturating_sub(1) as i32)
        } else {
            base
        };
        let capped = delay.min(self.options.max_delay.as_millis() as f64);

        let jitter_ms = self.options.max_jitter.as_millis() as u64;
        let jitter = if self.options.use_jitter && jitter_ms > 0 {
            rand::thread_rng().gen_range(0..jitter_ms)
        } else {
            0
        };

        Duration::from_millis(capped as u64 + jitter)
    }

    /// Delay before retrying after `response`, honouring `Retry-After`.
    pub fn delay_for_response(&self, retry: u32, response: &HttpResponse) -> Duration {
        match response.header("retry-after").map(parse_retry_after) {
            Some(after) if !after.is_zero() => after.min(self.options.max_delay),
            _ => self.calculate_delay(retry),
        }
    }

    /// Whether `status` is retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        RETRYABLE_STATUS_CODES.contains(&status)
    }

    /// Network failures and timeouts are retried.
    pub fn is_retryable_error(&self, error: &ProcoreError) -> bool {
        match error {
            ProcoreError::Network(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn record_attempt(&self) {
        self.stats.lock().total_attempts += 1;
    }

    pub(crate) fn record_outcome(&self, attempts: u32, succeeded: bool) {
        let mut stats = self.stats.lock();
        if succeeded {
            if attempts > 1 {
                stats.successful_retries += 1;
            }
        } else {
            stats.failed_operations += 1;
        }
    }

    /// Get statistics.
    pub fn get_stats(&self) -> RetryStats {
        self.stats.lock().clone()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}
