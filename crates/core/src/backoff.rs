//! Delay policy for runs of consecutive extraction failures.

use std::time::Duration;

/// Exponential backoff with a cap, reset on the first success. Owned by
/// the orchestrator task, so no interior synchronization is needed.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            consecutive_failures: 0,
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Delay to apply before the next cycle may start. Zero until the
    /// first failure, then base * 2^(n-1) capped at max.
    pub fn delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let exp = self.consecutive_failures.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1u32 << exp);
        delay.min(self.max)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_delay_before_failures() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(backoff.delay(), Duration::ZERO);
    }

    #[test]
    fn test_delay_doubles_per_failure() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_millis(100));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_millis(200));
        backoff.record_failure();
        assert_eq!(backoff.delay(), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_is_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(250));
        for _ in 0..10 {
            backoff.record_failure();
        }
        assert_eq!(backoff.delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        backoff.record_failure();
        backoff.record_failure();
        backoff.record_success();
        assert_eq!(backoff.delay(), Duration::ZERO);
        assert_eq!(backoff.consecutive_failures(), 0);
    }
}
