//! Bounded retry with exponential backoff.

use std::time::Duration;

/// Tries per channel before falling through to the next channel.
pub const DEFAULT_MAX_TRIES: u32 = 3;

/// Delay after the first failed try; doubled after each further failure.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Upper bound for any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Tries per channel, including the first one.
    pub max_tries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A single try per channel, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_tries: 1,
            ..Default::default()
        }
    }

    /// Delay to wait after failed try number `try_number` (1-based).
    pub fn delay_after(&self, try_number: u32) -> Duration {
        let exponent = try_number.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Whether another try on the same channel is allowed after `try_number`.
    pub fn should_retry(&self, try_number: u32) -> bool {
        try_number < self.max_tries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(16));
        // 32s is capped
        assert_eq!(policy.delay_after(5), Duration::from_secs(30));
        assert_eq!(policy.delay_after(40), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry_bounds() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn test_huge_exponent_stays_capped() {
        let policy = RetryPolicy {
            backoff_factor: 10.0,
            ..Default::default()
        };
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(30));
    }
}
