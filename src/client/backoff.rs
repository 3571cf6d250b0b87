use crate::config::RetryConfig;
use std::time::Duration;

/// Capped exponential backoff: `min(base * 2^(retry - 1), cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(10_000),
        }
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base: config.base_delay,
            cap: config.max_delay,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry`, counted from 1.
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exp)
            .unwrap_or(Duration::MAX)
            .min(self.cap)
    }

    /// Delays for retries `1..=retries`.
    pub fn schedule(&self, retries: u32) -> Vec<Duration> {
        (1..=retries).map(|k| self.delay(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_default_sequence() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.schedule(7),
            vec![ms(1000), ms(2000), ms(4000), ms(8000), ms(10_000), ms(10_000), ms(10_000)]
        );
    }

    #[test]
    fn test_matches_closed_form() {
        let policy = BackoffPolicy::default();
        for k in 1..=20u32 {
            let expected = (1000u64 * 2u64.pow(k - 1)).min(10_000);
            assert_eq!(policy.delay(k), ms(expected), "retry {}", k);
        }
    }

    #[test]
    fn test_huge_retry_numbers_saturate_at_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(64), ms(10_000));
        assert_eq!(policy.delay(u32::MAX), ms(10_000));
    }

    #[test]
    fn test_retry_zero_treated_as_first() {
        assert_eq!(BackoffPolicy::default().delay(0), ms(1000));
        assert!(BackoffPolicy::default().schedule(0).is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            base_delay: ms(50),
            max_delay: ms(120),
            ..RetryConfig::default()
        };
        let policy = BackoffPolicy::from(&config);
        assert_eq!(policy.schedule(4), vec![ms(50), ms(100), ms(120), ms(120)]);
    }
}
