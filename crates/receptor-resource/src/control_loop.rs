use std::time::Duration;

use serde::Serialize;

use crate::ClassSnapshot;

/// Read-only view of every class plus `batchSize` and the current
/// adaptation cadence — exposed for logging/metrics (spec.md §4.D "exposed
/// as read-only `ResourceUtilization`").
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ResourceUtilization {
    pub discovery: ClassSnapshot,
    pub sync: ClassSnapshot,
    pub balance_update: ClassSnapshot,
    pub validation: ClassSnapshot,
    pub api_call: ClassSnapshot,
    pub batch: ClassSnapshot,
    pub batch_size: u32,
    pub adaptation_interval_secs: u64,
}

/// What one `adapt()` pass decided, for logging.
#[derive(Clone, Copy, Debug)]
pub struct AdaptationDecision {
    pub pressure: bool,
    pub favorable: bool,
    pub batch_size: u32,
    pub adaptation_interval: Duration,
}

/// Shared three-way step logic used for `batchSize` (same rule as
/// [`crate::class::ResourceClass::step`], parameterized over plain `u32`
/// bounds instead of a semaphore).
pub fn step_value(current: u32, min: u32, max: u32, pressure: bool, favorable: bool, target: u32, step: u32) -> u32 {
    let goal = if pressure {
        min
    } else if favorable {
        max
    } else {
        target.clamp(min, max)
    };

    if goal > current {
        current + step.min(goal - current)
    } else if goal < current {
        current - step.min(current - goal)
    } else {
        current
    }
}
