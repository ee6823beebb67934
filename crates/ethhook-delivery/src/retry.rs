//! Retry-delay schedule for failed deliveries, per spec §4.7:
//! `delay = min(max_delay, base_delay * multiplier^attempt)`, ±25% uniform
//! jitter, floored at `base_delay`.
//!
//! Grounded on `original_source/.../retry.c`'s `retry_calculate_delay`,
//! reimplemented with one fix: the C original reseeds the PRNG with
//! `srand(time(NULL))` on every call, which defeats its own jitter for any
//! two calls landing in the same wall-clock second. This version draws
//! from `rand::thread_rng()` per call instead, the way the teacher's own
//! code reaches for `rand` for per-call randomness rather than a
//! manually-seeded generator.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `attempt` is the 0-based attempt number just completed; this
    /// returns the delay before the next attempt (`attempt + 1`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.base_delay_ms);
        }

        let mut delay =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        delay = delay.min(self.max_delay_ms as f64);

        let jitter = rand::thread_rng().gen_range(-0.25..=0.25);
        delay *= 1.0 + jitter;

        delay = delay.max(self.base_delay_ms as f64);
        Duration::from_millis(delay.round() as u64)
    }

    /// `max_retries` is the endpoint's own retry ceiling, carried inline on
    /// the job rather than read back from this policy's own defaults.
    pub fn should_retry(&self, attempt_after_failure: u32, max_retries: u32) -> bool {
        attempt_after_failure <= max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_respects_base_and_max() {
        let policy = RetryPolicy::default();
        for attempt in 1..10 {
            let delay = policy.delay_for(attempt);
            assert!(delay.as_millis() as u64 >= policy.base_delay_ms);
            assert!(delay.as_millis() as u64 <= policy.max_delay_ms);
        }
    }

    #[test]
    fn delay_grows_with_attempt_before_capping() {
        let policy = RetryPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        };
        // Even with max jitter shaving 25% off, attempt 3's uncapped curve
        // (4s) comfortably exceeds attempt 1's capped range (1s-1.25s).
        let low_attempt_delay = policy.delay_for(1).as_millis();
        let high_attempt_delay = policy.delay_for(3).as_millis();
        assert!(high_attempt_delay > low_attempt_delay);
    }

    #[test]
    fn should_retry_honors_max_retries() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(5, 5));
        assert!(!policy.should_retry(6, 5));
    }
}
