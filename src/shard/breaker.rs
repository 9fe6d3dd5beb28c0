//! Per-shard circuit breaker: Closed → Open → HalfOpen → Closed (§4.E).

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at_ms: u64,
    /// Set while a HalfOpen probe is in flight, so only one probe is admitted.
    probe_in_flight: bool,
}

/// Tracks consecutive-failure counts and open/half-open timing for a single
/// shard. `execute`-style callers check [`Breaker::admit`] before dispatching
/// and report the outcome via [`Breaker::on_success`]/[`Breaker::on_failure`].
pub struct Breaker {
    failure_threshold: u32,
    recovery_ms: u64,
    inner: Mutex<Inner>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Breaker {
    pub fn new(failure_threshold: u32, recovery_ms: u64) -> Self {
        Self {
            failure_threshold,
            recovery_ms,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at_ms: 0,
                probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Returns `true` if a call is admitted right now. Transitions
    /// Open -> HalfOpen when `recovery_ms` has elapsed, and admits exactly
    /// one probe while HalfOpen.
    pub fn admit(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                if now_ms().saturating_sub(inner.opened_at_ms) >= self.recovery_ms {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at_ms = now_ms();
                inner.probe_in_flight = false;
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at_ms = now_ms();
                }
            }
            BreakerState::Open => {
                inner.opened_at_ms = now_ms();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_open_after_threshold_consecutive_failures() {
        let b = Breaker::new(3, 30_000);
        assert!(b.admit());
        b.on_failure();
        assert!(b.admit());
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.admit());
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.admit());
    }

    #[test]
    fn success_resets_failure_count() {
        let b = Breaker::new(2, 30_000);
        b.on_failure();
        b.on_success();
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_admits_single_probe() {
        let b = Breaker::new(1, 0);
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(b.admit());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(!b.admit());
    }

    #[test]
    fn half_open_probe_success_closes_breaker() {
        let b = Breaker::new(1, 0);
        b.on_failure();
        assert!(b.admit());
        b.on_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.admit());
    }

    #[test]
    fn half_open_probe_failure_reopens_and_resets_timer() {
        let b = Breaker::new(1, 0);
        b.on_failure();
        assert!(b.admit());
        b.on_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }
}
