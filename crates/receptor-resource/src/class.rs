use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::ClassSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceClassName {
    Discovery,
    Sync,
    BalanceUpdate,
    Validation,
    ApiCall,
    Batch,
}

/// One named semaphore class: `min`/`max`/live `current` permit count, plus
/// the actual `tokio::sync::Semaphore` callers acquire against. Growing
/// releases fresh permits into the semaphore; shrinking acquires and
/// `forget()`s the surplus so in-flight holders are never interrupted
/// (spec.md §4.D).
pub struct ResourceClass {
    semaphore: Arc<Semaphore>,
    min: u32,
    max: u32,
    current: AtomicU32,
}

impl ResourceClass {
    pub fn new(min: u32, max: u32) -> Self {
        Self::with_initial(min, min, max)
    }

    /// Like [`ResourceClass::new`] but seeds `current` (and the live
    /// semaphore) at `initial` rather than `min` — for classes whose
    /// documented starting point sits above their floor (spec.md §6
    /// `sync.parallelism`, default 100).
    pub fn with_initial(min: u32, initial: u32, max: u32) -> Self {
        let initial = initial.clamp(min, max);
        Self {
            semaphore: Arc::new(Semaphore::new(initial as usize)),
            min,
            max,
            current: AtomicU32::new(initial),
        }
    }

    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    pub fn snapshot(&self) -> ClassSnapshot {
        ClassSnapshot { min: self.min, max: self.max, current: self.current.load(Ordering::SeqCst) }
    }

    /// Applies one adaptation step (spec.md §4.D three-way rule):
    /// - under pressure: shrink toward `min`
    /// - favorable: grow toward `max`
    /// - otherwise: move one step toward `target`, clamped to `[min, max]`
    pub fn step(&self, pressure: bool, favorable: bool, target: u32, step: u32) {
        let current = self.current.load(Ordering::SeqCst);
        let goal = if pressure {
            self.min
        } else if favorable {
            self.max
        } else {
            target.clamp(self.min, self.max)
        };

        let next = if goal > current {
            let grow_by = step.min(goal - current);
            self.semaphore.add_permits(grow_by as usize);
            current + grow_by
        } else if goal < current {
            let shrink_by = step.min(current - goal);
            let mut actually_shrunk = 0u32;
            for _ in 0..shrink_by {
                match Arc::clone(&self.semaphore).try_acquire_owned() {
                    Ok(permit) => {
                        permit.forget();
                        actually_shrunk += 1;
                    }
                    Err(_) => break,
                }
            }
            current - actually_shrunk
        } else {
            current
        };

        self.current.store(next, Ordering::SeqCst);
    }
}
