use std::time::Duration;

/// Deterministic exponential backoff: attempt `k` waits
/// `min(initial * 2^(k-1), max)`. No jitter; permanence is only established
/// by exhausting `max_attempts`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_then_caps() {
        let policy = RetryPolicy::default();
        let waits: Vec<u64> = (1..=5).map(|k| policy.delay_for(k).as_secs()).collect();

        assert_eq!(waits, vec![2, 4, 8, 10, 10]);
    }

    #[test]
    fn exhaustion_at_max_attempts() {
        let policy = RetryPolicy::default();

        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
        assert!(policy.is_exhausted(6));
    }

    #[test]
    fn large_attempt_numbers_do_not_overflow() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(64), policy.max_delay);
    }
}
