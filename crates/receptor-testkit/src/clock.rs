use std::sync::Mutex;

use chrono::{DateTime, Utc};
use receptor_core::Clock;

/// Deterministic, manually-advanced clock for tests that care about exact
/// timestamps (retry backoff, abandonment windows, TTL expiry).
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self { now: Mutex::new(Utc::now()) }
    }
}

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard = *guard + delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
