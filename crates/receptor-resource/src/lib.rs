//! Adaptive Resource Manager — component D (spec.md §4.D).
//!
//! Owns a named set of semaphores (`discovery`, `sync`, `balanceUpdate`,
//! `validation`, `apiCall`, `batch`), each with a `min`/`max`/live `current`
//! permit count, plus a `batchSize` that follows the same three-way
//! adaptation logic. `acquire`/`release` are non-blocking `tryAcquire` so
//! callers implement backpressure explicitly rather than queueing here.

mod class;
mod control_loop;

pub use class::{ResourceClass, ResourceClassName};
pub use control_loop::{AdaptationDecision, ResourceUtilization};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use receptor_monitor::{OperationReport, Recommendations};
use serde::Serialize;
use tokio::sync::OwnedSemaphorePermit;
use tracing::info;

pub const CPU_HI: f64 = 0.80;
pub const MEM_HI: f64 = 0.85;
pub const MIN_ADAPTATION_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_ADAPTATION_INTERVAL: Duration = Duration::from_secs(120);
pub const DEFAULT_ADAPTATION_INTERVAL: Duration = Duration::from_secs(30);
pub const MIN_BATCH: u32 = 50;
pub const MAX_BATCH: u32 = 1000;

/// `sync.parallelism` default (spec.md §6): the `sync` class starts at 100
/// permits rather than at its `min` floor.
pub const DEFAULT_SYNC_PARALLELISM: u32 = 100;
/// `sync.batchSize` default (spec.md §6).
pub const DEFAULT_SYNC_BATCH_SIZE: u32 = 1000;

const STEP: u32 = 2;

/// The `sync.*`/`resource.*` configuration keys spec.md §6 documents
/// (everything this crate's control loop reads at construction time).
#[derive(Clone, Copy, Debug)]
pub struct ResourceConfig {
    pub sync_parallelism: u32,
    pub sync_batch_size: u32,
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub interval_min: Duration,
    pub interval_max: Duration,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            sync_parallelism: DEFAULT_SYNC_PARALLELISM,
            sync_batch_size: DEFAULT_SYNC_BATCH_SIZE,
            cpu_threshold: CPU_HI,
            memory_threshold: MEM_HI,
            interval_min: MIN_ADAPTATION_INTERVAL,
            interval_max: MAX_ADAPTATION_INTERVAL,
        }
    }
}

pub struct AdaptiveResourceManager {
    discovery: ResourceClass,
    sync: ResourceClass,
    balance_update: ResourceClass,
    validation: ResourceClass,
    api_call: ResourceClass,
    batch: ResourceClass,
    batch_size: AtomicU32,
    adaptation_interval: Mutex<Duration>,
    cpu_hi: f64,
    mem_hi: f64,
    interval_min: Duration,
    interval_max: Duration,
}

impl Default for AdaptiveResourceManager {
    fn default() -> Self {
        Self::from_config(&ResourceConfig::default())
    }
}

impl AdaptiveResourceManager {
    /// Builds the manager from the `sync.*`/`resource.*` keys (spec.md §6),
    /// seeding `sync`'s `current` and the process-wide `batchSize` at their
    /// documented defaults rather than at the classes' `min` floor.
    pub fn from_config(config: &ResourceConfig) -> Self {
        Self {
            discovery: ResourceClass::new(5, 50),
            sync: ResourceClass::with_initial(10, config.sync_parallelism, 200),
            balance_update: ResourceClass::new(10, 200),
            validation: ResourceClass::new(5, 100),
            api_call: ResourceClass::new(20, 300),
            batch: ResourceClass::new(2, 20),
            batch_size: AtomicU32::new(config.sync_batch_size.clamp(MIN_BATCH, MAX_BATCH)),
            adaptation_interval: Mutex::new(DEFAULT_ADAPTATION_INTERVAL),
            cpu_hi: config.cpu_threshold,
            mem_hi: config.memory_threshold,
            interval_min: config.interval_min,
            interval_max: config.interval_max,
        }
    }

    pub fn class(&self, name: ResourceClassName) -> &ResourceClass {
        match name {
            ResourceClassName::Discovery => &self.discovery,
            ResourceClassName::Sync => &self.sync,
            ResourceClassName::BalanceUpdate => &self.balance_update,
            ResourceClassName::Validation => &self.validation,
            ResourceClassName::ApiCall => &self.api_call,
            ResourceClassName::Batch => &self.batch,
        }
    }

    /// Non-blocking `tryAcquire`; `None` means the class is saturated and
    /// the caller must apply its own backpressure.
    pub fn acquire(&self, name: ResourceClassName) -> Option<OwnedSemaphorePermit> {
        self.class(name).try_acquire()
    }

    pub fn current_batch_size(&self) -> u32 {
        self.batch_size.load(Ordering::SeqCst)
    }

    pub fn adaptation_interval(&self) -> Duration {
        *self.adaptation_interval.lock().unwrap()
    }

    /// One pass of the control loop (spec.md §4.D): from the latest
    /// Performance Monitor report plus live CPU/heap samples, recompute
    /// every class's `current` and `batchSize`.
    pub fn adapt(&self, report: &OperationReport, cpu_load: f64, mem_used_ratio: f64) -> AdaptationDecision {
        let recommendations = receptor_monitor::PerformanceMonitor::recommendations(report);
        let pressure = cpu_load > self.cpu_hi || mem_used_ratio > self.mem_hi;
        let throughput_climbing = report.throughput_per_sec > 0.0;
        let favorable = report.efficiency > 0.90 && throughput_climbing && !pressure;

        for class in [
            &self.discovery,
            &self.sync,
            &self.balance_update,
            &self.validation,
            &self.api_call,
            &self.batch,
        ] {
            class.step(pressure, favorable, recommendations.concurrency, STEP);
        }

        let batch_target = recommendations.batch_size.clamp(MIN_BATCH, MAX_BATCH);
        let new_batch = control_loop::step_value(
            self.batch_size.load(Ordering::SeqCst),
            MIN_BATCH,
            MAX_BATCH,
            pressure,
            favorable,
            batch_target,
            STEP * 10,
        );
        self.batch_size.store(new_batch, Ordering::SeqCst);

        let mut interval = self.adaptation_interval.lock().unwrap();
        *interval = if pressure {
            Duration::from_secs((interval.as_secs().saturating_sub(5)).max(self.interval_min.as_secs()))
        } else {
            Duration::from_secs((interval.as_secs() + 5).min(self.interval_max.as_secs()))
        };

        info!(pressure, favorable, batch_size = new_batch, interval_secs = interval.as_secs(), "resource manager adapted");

        AdaptationDecision { pressure, favorable, batch_size: new_batch, adaptation_interval: *interval }
    }

    pub fn utilization(&self) -> ResourceUtilization {
        ResourceUtilization {
            discovery: self.discovery.snapshot(),
            sync: self.sync.snapshot(),
            balance_update: self.balance_update.snapshot(),
            validation: self.validation.snapshot(),
            api_call: self.api_call.snapshot(),
            batch: self.batch.snapshot(),
            batch_size: self.current_batch_size(),
            adaptation_interval_secs: self.adaptation_interval().as_secs(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ClassSnapshot {
    pub min: u32,
    pub max: u32,
    pub current: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use receptor_monitor::OperationReport;

    fn report(efficiency: f64, throughput: f64) -> OperationReport {
        OperationReport {
            operation: "sync".into(),
            throughput_per_sec: throughput,
            efficiency,
            mean_latency_ms: 5.0,
            error_rate: 1.0 - efficiency,
            active_concurrency: 0,
        }
    }

    #[test]
    fn under_pressure_classes_shrink_toward_min() {
        let manager = AdaptiveResourceManager::default();
        let before = manager.sync.snapshot().current;
        manager.adapt(&report(0.5, 10.0), 0.95, 0.5);
        let after = manager.sync.snapshot().current;
        assert!(after <= before);
    }

    #[test]
    fn favorable_conditions_grow_classes_toward_max() {
        let manager = AdaptiveResourceManager::default();
        let before = manager.sync.snapshot().current;
        manager.adapt(&report(0.95, 200.0), 0.1, 0.1);
        let after = manager.sync.snapshot().current;
        assert!(after >= before);
    }

    #[test]
    fn batch_size_stays_within_bounds() {
        let manager = AdaptiveResourceManager::default();
        for _ in 0..50 {
            manager.adapt(&report(0.95, 200.0), 0.1, 0.1);
        }
        assert!(manager.current_batch_size() <= MAX_BATCH);
        assert!(manager.current_batch_size() >= MIN_BATCH);
    }
}
