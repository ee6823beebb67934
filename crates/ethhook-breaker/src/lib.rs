//! Per-endpoint circuit breaker and registry.
//!
//! Grounded directly on the original `circuit_breaker_t`
//! (`circuit_breaker_init`/`_allow`/`_success`/`_failure`): three states
//! (closed, open, half-open), lock-free transitions driven by atomics, a
//! failure threshold that trips the breaker, a timeout before a trial
//! half-open request is let through, and a run of successful half-open
//! calls that closes it again. The state machine below is a line-for-line
//! port of that file's transition table onto `AtomicU8`/`AtomicU32`/
//! `AtomicI64`, the same primitives the teacher's allocator module uses
//! for its lock-free counters.
//!
//! `BreakerRegistry` maps endpoint ids to breakers the way the teacher's
//! `gazette` route table maps journal names to routes: a concurrent map
//! that every delivery worker reads and writes without a lock, backed by
//! `dashmap`.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use uuid::Uuid;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for BreakerState {
    fn from(value: u8) -> Self {
        match value {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

/// Tunables for a single endpoint's breaker. Defaults match the original
/// `circuit_breaker_init` call sites: 5 consecutive failures to trip, a
/// 30s open timeout, up to 3 trial calls while half-open.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout_ms: i64,
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            open_timeout_ms: 30_000,
            half_open_max_calls: 3,
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_millis() as i64
}

/// A single endpoint's breaker. All operations are lock-free; concurrent
/// callers may race on a transition but never observe a state outside the
/// closed/open/half-open set.
pub struct EndpointBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_time_ms: AtomicI64,
    config: BreakerConfig,
}

impl EndpointBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        EndpointBreaker {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_time_ms: AtomicI64::new(0),
            config,
        }
    }

    pub fn state(&self) -> BreakerState {
        BreakerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Whether a call is currently allowed through. Performs the
    /// open-to-half-open transition as a side effect when the timeout has
    /// elapsed, matching `circuit_breaker_allow`.
    pub fn may_proceed(&self) -> bool {
        let state = self.state.load(Ordering::SeqCst);
        match state {
            STATE_CLOSED => true,
            STATE_OPEN => {
                let last_failure = self.last_failure_time_ms.load(Ordering::SeqCst);
                if now_ms() - last_failure >= self.config.open_timeout_ms {
                    let won = self
                        .state
                        .compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok();
                    if won {
                        self.success_count.store(0, Ordering::SeqCst);
                        self.failure_count.store(0, Ordering::SeqCst);
                        return true;
                    }
                }
                false
            }
            STATE_HALF_OPEN => {
                let success = self.success_count.load(Ordering::SeqCst);
                let failure = self.failure_count.load(Ordering::SeqCst);
                success + failure < self.config.half_open_max_calls
            }
            _ => unreachable!("breaker state is always one of the three encoded values"),
        }
    }

    /// Records a successful call. In the half-open state, enough
    /// successes close the breaker; in the closed state, a success simply
    /// resets the failure streak.
    pub fn record_success(&self) {
        let state = self.state.load(Ordering::SeqCst);
        if state == STATE_HALF_OPEN {
            let success = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
            if success >= self.config.half_open_max_calls {
                self.state.store(STATE_CLOSED, Ordering::SeqCst);
                self.failure_count.store(0, Ordering::SeqCst);
                self.success_count.store(0, Ordering::SeqCst);
            }
        } else if state == STATE_CLOSED {
            self.failure_count.store(0, Ordering::SeqCst);
        }
    }

    /// Records a failed call. A failure while half-open immediately
    /// reopens the breaker; a failure while closed counts toward the trip
    /// threshold.
    pub fn record_failure(&self) {
        let state = self.state.load(Ordering::SeqCst);
        self.last_failure_time_ms.store(now_ms(), Ordering::SeqCst);

        if state == STATE_HALF_OPEN {
            self.state.store(STATE_OPEN, Ordering::SeqCst);
            self.failure_count.store(0, Ordering::SeqCst);
            self.success_count.store(0, Ordering::SeqCst);
        } else if state == STATE_CLOSED {
            let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
            if failures >= self.config.failure_threshold {
                self.state.store(STATE_OPEN, Ordering::SeqCst);
            }
        }
    }
}

/// Concurrent registry of per-endpoint breakers, created lazily on first
/// use with the default configuration.
pub struct BreakerRegistry {
    breakers: DashMap<Uuid, Arc<EndpointBreaker>>,
    config: BreakerConfig,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        BreakerRegistry {
            breakers: DashMap::new(),
            config,
        }
    }

    pub fn breaker_for(&self, endpoint_id: Uuid) -> Arc<EndpointBreaker> {
        self.breakers
            .entry(endpoint_id)
            .or_insert_with(|| Arc::new(EndpointBreaker::new(self.config)))
            .clone()
    }

    pub fn may_proceed(&self, endpoint_id: Uuid) -> bool {
        self.breaker_for(endpoint_id).may_proceed()
    }

    pub fn record_success(&self, endpoint_id: Uuid) {
        self.breaker_for(endpoint_id).record_success();
    }

    pub fn record_failure(&self, endpoint_id: Uuid) {
        self.breaker_for(endpoint_id).record_failure();
    }

    pub fn state_of(&self, endpoint_id: Uuid) -> BreakerState {
        self.breaker_for(endpoint_id).state()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        BreakerRegistry::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            open_timeout_ms: 0,
            half_open_max_calls: 2,
        }
    }

    #[test]
    fn starts_closed_and_allows_calls() {
        let cb = EndpointBreaker::new(test_config());
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.may_proceed());
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let cb = EndpointBreaker::new(test_config());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.may_proceed() || cb.state() == BreakerState::HalfOpen);
    }

    #[test]
    fn success_resets_failure_streak_while_closed() {
        let cb = EndpointBreaker::new(test_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn open_transitions_to_half_open_after_timeout() {
        let cb = EndpointBreaker::new(test_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        // open_timeout_ms == 0 in test_config, so the next `may_proceed`
        // call observes the timeout as already elapsed.
        assert!(cb.may_proceed());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_limits_concurrent_trial_calls() {
        let cb = EndpointBreaker::new(test_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.may_proceed());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.may_proceed());
        cb.record_success();
        assert!(!cb.may_proceed());
    }

    #[test]
    fn half_open_closes_after_enough_successes() {
        let cb = EndpointBreaker::new(test_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        cb.may_proceed();
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = EndpointBreaker::new(test_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        cb.may_proceed();
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[test]
    fn registry_creates_independent_breakers_per_endpoint() {
        let registry = BreakerRegistry::new(test_config());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.record_failure(a);
        registry.record_failure(a);
        registry.record_failure(a);
        assert_eq!(registry.state_of(a), BreakerState::Open);
        assert_eq!(registry.state_of(b), BreakerState::Closed);
    }
}
