//! Process-level configuration surface — spec.md §6 "Configuration".
//!
//! The concrete loader (env vars / file / secrets manager) is an external
//! collaborator; this struct only carries the subset of keys an operator
//! plausibly overrides at process start.

use std::time::Duration;

use receptor_resource::ResourceConfig;
use serde::{Deserialize, Serialize};

fn default_sync_cron_secs() -> u64 {
    12 * 60 * 60
}

fn default_queue_poll_secs() -> u64 {
    5
}

fn default_queue_batch() -> usize {
    50
}

fn default_abandonment_sweep_secs() -> u64 {
    60
}

fn default_sync_parallelism() -> u32 {
    receptor_resource::DEFAULT_SYNC_PARALLELISM
}

fn default_sync_batch_size() -> u32 {
    receptor_resource::DEFAULT_SYNC_BATCH_SIZE
}

fn default_sync_timeout_secs() -> u64 {
    30
}

fn default_resource_cpu_threshold() -> f64 {
    receptor_resource::CPU_HI
}

fn default_resource_memory_threshold() -> f64 {
    receptor_resource::MEM_HI
}

fn default_resource_interval_min_secs() -> u64 {
    receptor_resource::MIN_ADAPTATION_INTERVAL.as_secs()
}

fn default_resource_interval_max_secs() -> u64 {
    receptor_resource::MAX_ADAPTATION_INTERVAL.as_secs()
}

/// Mirrors spec.md §6's `sync.*` / `resource.*` configuration keys. Values
/// not represented here (`circuit.*`, `retry.*`, `rateLimiter.*`) are
/// compiled-in defaults on the resilience primitives themselves rather than
/// runtime knobs, matching the defaults the spec documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceptorConfig {
    /// `sync.cron` (spec.md §6) — expressed here as a fixed interval in
    /// seconds rather than a cron expression; default 12h (spec.md §4.G).
    #[serde(default = "default_sync_cron_secs")]
    pub sync_interval_secs: u64,

    /// How often the Job Queue worker polls for PENDING work.
    #[serde(default = "default_queue_poll_secs")]
    pub queue_poll_interval_secs: u64,

    /// Batch size the Job Queue worker reserves per poll.
    #[serde(default = "default_queue_batch")]
    pub queue_batch_size: usize,

    /// How often `JobQueue::reap_abandoned` runs.
    #[serde(default = "default_abandonment_sweep_secs")]
    pub abandonment_sweep_secs: u64,

    /// `sync.parallelism` (spec.md §6) — initial permit count for `sync`.
    #[serde(default = "default_sync_parallelism")]
    pub sync_parallelism: u32,

    /// `sync.batchSize` (spec.md §6) — initial batch size handed to F.
    #[serde(default = "default_sync_batch_size")]
    pub sync_batch_size: u32,

    /// `sync.timeoutSeconds` (spec.md §6) — per-item HTTP timeout.
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// `resource.cpu-threshold` (spec.md §6).
    #[serde(default = "default_resource_cpu_threshold")]
    pub resource_cpu_threshold: f64,

    /// `resource.memory-threshold` (spec.md §6).
    #[serde(default = "default_resource_memory_threshold")]
    pub resource_memory_threshold: f64,

    /// `resource.interval.min` (spec.md §6).
    #[serde(default = "default_resource_interval_min_secs")]
    pub resource_interval_min_secs: u64,

    /// `resource.interval.max` (spec.md §6).
    #[serde(default = "default_resource_interval_max_secs")]
    pub resource_interval_max_secs: u64,
}

impl Default for ReceptorConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_cron_secs(),
            queue_poll_interval_secs: default_queue_poll_secs(),
            queue_batch_size: default_queue_batch(),
            abandonment_sweep_secs: default_abandonment_sweep_secs(),
            sync_parallelism: default_sync_parallelism(),
            sync_batch_size: default_sync_batch_size(),
            sync_timeout_secs: default_sync_timeout_secs(),
            resource_cpu_threshold: default_resource_cpu_threshold(),
            resource_memory_threshold: default_resource_memory_threshold(),
            resource_interval_min_secs: default_resource_interval_min_secs(),
            resource_interval_max_secs: default_resource_interval_max_secs(),
        }
    }
}

impl ReceptorConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_secs(self.queue_poll_interval_secs)
    }

    pub fn abandonment_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.abandonment_sweep_secs)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Projects this config's `sync.*`/`resource.*` keys into the shape
    /// `AdaptiveResourceManager::from_config` expects.
    pub fn resource_config(&self) -> ResourceConfig {
        ResourceConfig {
            sync_parallelism: self.sync_parallelism,
            sync_batch_size: self.sync_batch_size,
            cpu_threshold: self.resource_cpu_threshold,
            memory_threshold: self.resource_memory_threshold,
            interval_min: Duration::from_secs(self.resource_interval_min_secs),
            interval_max: Duration::from_secs(self.resource_interval_max_secs),
        }
    }
}
