//! Retry policy for provider calls

use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff: `base * 2^attempt`, capped
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether another attempt is allowed after `attempts` calls
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts <= self.max_retries
    }

    /// Delay before retry number `retry` (0-based); a provider hint wins if longer
    pub fn delay(&self, retry: u32, retry_after_ms: Option<u64>) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        let backoff = self.base_delay.saturating_mul(factor).min(MAX_BACKOFF);
        match retry_after_ms {
            Some(ms) => backoff.max(Duration::from_millis(ms).min(MAX_BACKOFF)),
            None => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(250))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay(2, None), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        assert_eq!(policy.delay(10, None), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_after_hint() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay(0, Some(1500)), Duration::from_millis(1500));
        assert_eq!(policy.delay(2, Some(10)), Duration::from_millis(400));
    }

    #[test]
    fn test_allows_retry() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert!(!RetryPolicy::none().allows_retry(1));
    }
}
