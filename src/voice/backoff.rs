//! Exponential backoff between failed listening cycles

use std::time::Duration;

/// Delay policy applied after consecutive recognizer errors
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay after the first error (doubles each consecutive error)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    /// Delay before re-arming after the `attempt`-th consecutive error (0-based)
    ///
    /// `min(base_delay * 2^attempt, max_delay)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt() {
        let policy = BackoffPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn capped_at_max_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(40), policy.max_delay);
    }
}
