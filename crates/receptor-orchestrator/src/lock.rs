use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// A run is considered stale — and therefore stealable by a fresh
/// `try_acquire` — once it has held the lock longer than this without
/// releasing. Guards against a crashed process wedging the orchestrator
/// forever (spec.md §4.G "Concurrent executions are prevented by a
/// per-orchestrator-name in-progress lock with a stale-lock sweep").
pub const STALE_AFTER: chrono::Duration = chrono::Duration::hours(2);

struct Held {
    execution_id: String,
    acquired_at: DateTime<Utc>,
}

/// Per-`orchestrator-name` in-progress lock. One `SyncLock` instance guards
/// exactly one orchestrator name; construct one per named scheduler
/// instance (spec.md §9 "instantiate G twice with disjoint configuration").
pub struct SyncLock {
    held: Mutex<Option<Held>>,
}

impl Default for SyncLock {
    fn default() -> Self {
        Self { held: Mutex::new(None) }
    }
}

pub struct LockGuard<'a> {
    lock: &'a SyncLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        *self.lock.held.lock().unwrap() = None;
    }
}

impl SyncLock {
    /// Acquires the lock for `execution_id` unless another execution already
    /// holds it and that hold is not yet stale. Returns `None` if a live
    /// execution is in progress.
    pub fn try_acquire(&self, execution_id: &str, now: DateTime<Utc>) -> Option<LockGuard<'_>> {
        let mut guard = self.held.lock().unwrap();
        if let Some(held) = guard.as_ref() {
            if now - held.acquired_at < STALE_AFTER {
                return None;
            }
        }
        *guard = Some(Held { execution_id: execution_id.to_string(), acquired_at: now });
        Some(LockGuard { lock: self })
    }

    pub fn current_holder(&self) -> Option<String> {
        self.held.lock().unwrap().as_ref().map(|h| h.execution_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_while_first_is_held() {
        let lock = SyncLock::default();
        let t0 = Utc::now();
        let _guard = lock.try_acquire("run-1", t0).unwrap();
        assert!(lock.try_acquire("run-2", t0).is_none());
    }

    #[test]
    fn lock_releases_on_drop() {
        let lock = SyncLock::default();
        let t0 = Utc::now();
        {
            let _guard = lock.try_acquire("run-1", t0).unwrap();
        }
        assert!(lock.try_acquire("run-2", t0).is_some());
    }

    #[test]
    fn stale_lock_is_stolen_by_a_fresh_attempt() {
        let lock = SyncLock::default();
        let t0 = Utc::now();
        let guard = lock.try_acquire("run-1", t0).unwrap();
        std::mem::forget(guard); // simulate a crashed holder that never dropped its guard

        let later = t0 + STALE_AFTER + chrono::Duration::minutes(1);
        let stolen = lock.try_acquire("run-2", later);
        assert!(stolen.is_some());
        assert_eq!(lock.current_holder().unwrap(), "run-2");
    }
}
