use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ResilienceError;

const WINDOW_SIZE: usize = 20;
const MIN_CALLS: usize = 10;
const FAILURE_RATE_THRESHOLD: f64 = 0.5;
const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(10);
const OPEN_DURATION: chrono::Duration = chrono::Duration::seconds(30);
const HALF_OPEN_PROBES: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone, Copy)]
struct CallRecord {
    failed: bool,
    slow: bool,
}

struct Inner {
    state: State,
    window: VecDeque<CallRecord>,
    opened_at: Option<DateTime<Utc>>,
    /// Probes admitted since entering HALF_OPEN, capped at
    /// [`HALF_OPEN_PROBES`]. The first probe to complete decides the
    /// outcome: a success closes the breaker immediately, a failure reopens
    /// it and restarts the 30 s timer (spec.md §4.C, scenario S4).
    probes_admitted: u32,
}

/// Sliding-window circuit breaker: window of 20 calls, minimum 10 before the
/// breaker can trip, trips at >=50% failure rate or >=50% slow-call rate
/// (>10s), open for 30s, half-open admits up to 5 probes but closes on the
/// first one that succeeds (spec.md §4.C).
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
}

pub enum Admission {
    Admitted,
    /// Caller must not dispatch the call; for read endpoints the gateway
    /// falls back to an empty result, for writes it surfaces
    /// `ServiceUnavailable` (spec.md §4.C).
    Rejected,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                window: VecDeque::with_capacity(WINDOW_SIZE),
                opened_at: None,
                probes_admitted: 0,
            }),
        }
    }
}

impl CircuitBreaker {
    /// Call before dispatching. In `Open` state (with the 30s timer not yet
    /// elapsed) the call is rejected outright; once elapsed the breaker
    /// moves to `HalfOpen` and admits up to 5 probes.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Result<Admission, ResilienceError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => Ok(Admission::Admitted),
            State::Open => {
                if now - inner.opened_at.unwrap() >= OPEN_DURATION {
                    inner.state = State::HalfOpen;
                    inner.probes_admitted = 1;
                    Ok(Admission::Admitted)
                } else {
                    Err(ResilienceError::CircuitOpen)
                }
            }
            State::HalfOpen => {
                if inner.probes_admitted < HALF_OPEN_PROBES {
                    inner.probes_admitted += 1;
                    Ok(Admission::Admitted)
                } else {
                    Err(ResilienceError::CircuitOpen)
                }
            }
        }
    }

    /// Records the outcome of a dispatched call. `elapsed` drives the
    /// slow-call classification.
    pub fn record(&self, failed: bool, elapsed: Duration, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            State::HalfOpen => {
                if failed {
                    // Any probe failure reopens immediately and restarts the timer.
                    inner.state = State::Open;
                    inner.opened_at = Some(now);
                } else {
                    // A single successful probe closes the breaker (spec.md
                    // §4.C, scenario S4: "on 200 the breaker closes").
                    inner.state = State::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                }
                inner.probes_admitted = 0;
                return;
            }
            State::Open => return,
            State::Closed => {}
        }

        let slow = elapsed > SLOW_CALL_THRESHOLD;
        inner.window.push_back(CallRecord { failed, slow });
        if inner.window.len() > WINDOW_SIZE {
            inner.window.pop_front();
        }

        if inner.window.len() < MIN_CALLS {
            return;
        }

        let total = inner.window.len() as f64;
        let failure_rate = inner.window.iter().filter(|c| c.failed).count() as f64 / total;
        let slow_rate = inner.window.iter().filter(|c| c.slow).count() as f64 / total;

        if failure_rate >= FAILURE_RATE_THRESHOLD || slow_rate >= FAILURE_RATE_THRESHOLD {
            inner.state = State::Open;
            inner.opened_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_circuit_opens_after_failure_threshold_then_half_opens_and_closes() {
        let cb = CircuitBreaker::default();
        let t0 = Utc::now();

        for _ in 0..20 {
            assert!(matches!(cb.try_acquire(t0).unwrap(), Admission::Admitted));
            cb.record(true, Duration::from_millis(10), t0);
        }

        // 20 consecutive failures, well past the 10-call minimum: breaker is open.
        assert!(cb.try_acquire(t0).is_err());

        // Before 30s: still rejected.
        assert!(cb.try_acquire(t0 + chrono::Duration::seconds(10)).is_err());

        // After 30s: one probe admitted.
        let probe_time = t0 + OPEN_DURATION + chrono::Duration::seconds(1);
        assert!(matches!(cb.try_acquire(probe_time).unwrap(), Admission::Admitted));

        // A failed probe reopens immediately.
        cb.record(true, Duration::from_millis(10), probe_time);
        assert!(cb.try_acquire(probe_time).is_err());

        // After another 30s, a single successful probe closes the breaker.
        let second_probe_window = probe_time + OPEN_DURATION + chrono::Duration::seconds(1);
        assert!(matches!(cb.try_acquire(second_probe_window).unwrap(), Admission::Admitted));
        cb.record(false, Duration::from_millis(10), second_probe_window);

        // Closed: calls are admitted freely again without consuming the
        // half-open probe budget.
        for _ in 0..MIN_CALLS {
            assert!(matches!(cb.try_acquire(second_probe_window).unwrap(), Admission::Admitted));
        }
    }

    #[test]
    fn below_minimum_calls_never_trips() {
        let cb = CircuitBreaker::default();
        let t0 = Utc::now();
        for _ in 0..(MIN_CALLS - 1) {
            cb.try_acquire(t0).unwrap();
            cb.record(true, Duration::from_millis(10), t0);
        }
        assert!(cb.try_acquire(t0).is_ok());
    }
}
