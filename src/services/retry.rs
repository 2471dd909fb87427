// src/services/retry.rs

//! Retry schedule for image downloads.
//!
//! Every retryable failure is followed by an exponential backoff of
//! `base * 2^(attempt-1)`: 1s, 2s, 4s with the default base. A 429 response
//! additionally waits for the server's `Retry-After` (or the same
//! exponential step when the header is missing) before that backoff. The
//! server's value is capped at `download.max_retry_after_secs`.

use std::time::Duration;

use crate::error::DownloadError;
use crate::models::DownloadConfig;

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay after the first failed attempt.
    base_delay: Duration,

    /// Longest `Retry-After` honoured.
    max_retry_after: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_retry_after: Duration::from_secs(300),
        }
    }

    pub fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(config.max_retry, config.retry_base_delay())
            .with_max_retry_after(config.max_retry_after())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether `err` from attempt `attempt` (1-indexed) leaves budget for another try.
    pub fn should_retry(&self, err: &DownloadError, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.max_attempts
    }

    /// Backoff after attempt `attempt` (1-indexed) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Extra wait imposed by a rate-limited response on attempt `attempt`.
    pub fn rate_limit_wait(&self, retry_after: Option<u64>, attempt: u32) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs).min(self.max_retry_after),
            None => self.backoff(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        let total: Duration = (1..=3).map(|a| policy.backoff(a)).sum();
        assert_eq!(total, Duration::from_secs(7));
    }

    #[test]
    fn test_rate_limit_prefers_server_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_wait(Some(3), 1), Duration::from_secs(3));
        assert_eq!(policy.rate_limit_wait(None, 2), Duration::from_secs(2));
    }

    #[test]
    fn test_server_delay_is_capped() {
        let policy = RetryPolicy::default().with_max_retry_after(Duration::from_secs(60));
        assert_eq!(policy.rate_limit_wait(Some(86_400), 1), Duration::from_secs(60));
        assert_eq!(policy.rate_limit_wait(Some(5), 1), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_respects_budget_and_kind() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let timeout = DownloadError::Timeout { url: "u".into() };
        let interrupted = DownloadError::Interrupted { url: "u".into() };
        assert!(policy.should_retry(&timeout, 1));
        assert!(policy.should_retry(&timeout, 2));
        assert!(!policy.should_retry(&timeout, 3));
        assert!(!policy.should_retry(&interrupted, 1));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 3 "), Some(3));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
