//! Process-local circuit breaker guarding the cold tier only (spec.md §4.6.6,
//! §9 "single background timer, not distributed").
//!
//! Grounded on `aura-core::effects::reliability::ReliabilityEffects`'s
//! `with_circuit_breaker` and its `ReliabilityError::CircuitBreakerOpen`
//! naming; reworked here as a plain state machine behind a `parking_lot::Mutex`
//! rather than a generic higher-order-function trait, since this orchestrator
//! only ever wraps one kind of call (a cold-tier operation).

use authvault_types::config::CircuitBreakerConfig;
use std::time::{Duration, Instant};

/// The three states from spec.md §4.6.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without touching the cold tier.
    Open,
    /// One trial call is allowed through to probe recovery.
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: parking_lot::Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: parking_lot::Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether the caller may attempt the guarded operation. `Open` becomes
    /// `HalfOpen` (and returns `true`) once `reset_timeout_ms` has elapsed
    /// since the trip, per spec.md §4.6.6 step 3.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let reset_after = Duration::from_millis(self.config.reset_timeout_ms);
                if inner.opened_at.is_some_and(|t| t.elapsed() >= reset_after) {
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A successful call closes the circuit unconditionally, from `HalfOpen`
    /// or from `Closed` (resetting the failure streak).
    pub fn record_success(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.state
    }

    /// A failed call in `HalfOpen` re-opens immediately (the probe failed). A
    /// failed call in `Closed` opens once `failure_threshold` consecutive
    /// failures accumulate.
    pub fn record_failure(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
        inner.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, reset_timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            reset_timeout_ms,
        })
    }

    #[test]
    fn starts_closed_and_allows_requests() {
        let cb = breaker(3, 1000);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn open_rejects_requests_until_reset_timeout_elapses() {
        let cb = breaker(1, 20);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_closes_the_circuit() {
        let cb = breaker(1, 10);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        cb.allow_request();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = breaker(1, 10);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        cb.allow_request();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let cb = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed, "streak should have reset");
    }
}
