//! Performance Monitor — component E (spec.md §4.E).
//!
//! Thread-safe counters/timers/gauges keyed by `operationType`, windowed and
//! reset on inspection (or every `windowDuration`), feeding the Adaptive
//! Resource Manager's (component D) control loop. Never mutates state it did
//! not create itself — `getRecommendations` is advice, not a command.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Default rolling-window length (spec.md §4.E).
pub const DEFAULT_WINDOW: chrono::Duration = chrono::Duration::seconds(60);

struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
    total_latency_micros: AtomicU64,
    active: AtomicI64,
    window_started_at: Mutex<DateTime<Utc>>,
}

impl Counters {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            total_latency_micros: AtomicU64::new(0),
            active: AtomicI64::new(0),
            window_started_at: Mutex::new(now),
        }
    }
}

/// Point-in-time derived view of one `operationType`'s rolling window.
/// Serializable so it can be emitted as a structured log field or exported
/// as a metric (SPEC_FULL.md §2).
#[derive(Clone, Debug, Serialize)]
pub struct OperationReport {
    pub operation: String,
    pub throughput_per_sec: f64,
    pub efficiency: f64,
    pub mean_latency_ms: f64,
    pub error_rate: f64,
    pub active_concurrency: i64,
}

/// Batch-size/concurrency advice derived from [`OperationReport`] via the
/// deterministic rule table in spec.md §4.E.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Recommendations {
    pub batch_size: u32,
    pub concurrency: u32,
}

pub struct PerformanceMonitor {
    operations: DashMap<String, Counters>,
    window: chrono::Duration,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self { operations: DashMap::new(), window: DEFAULT_WINDOW }
    }

    fn counters(&self, operation: &str, now: DateTime<Utc>) -> dashmap::mapref::one::RefMut<'_, String, Counters> {
        self.operations
            .entry(operation.to_string())
            .or_insert_with(|| Counters::new(now))
    }

    pub fn start(&self, operation: &str, now: DateTime<Utc>) {
        self.counters(operation, now).active.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one completed call: `elapsed` in wall-clock time, `failed`
    /// for a non-retryable failure (retryable failures that eventually
    /// succeed are not counted against efficiency).
    pub fn complete(&self, operation: &str, elapsed: std::time::Duration, failed: bool, now: DateTime<Utc>) {
        let counters = self.counters(operation, now);
        counters.active.fetch_sub(1, Ordering::SeqCst);
        counters.calls.fetch_add(1, Ordering::SeqCst);
        if failed {
            counters.failures.fetch_add(1, Ordering::SeqCst);
        }
        counters.total_latency_micros.fetch_add(elapsed.as_micros() as u64, Ordering::SeqCst);
    }

    /// Derives an [`OperationReport`] from the current window, then resets
    /// the window — spec.md §4.E "reset on inspection, or every
    /// windowDuration".
    pub fn snapshot(&self, operation: &str, now: DateTime<Utc>) -> OperationReport {
        let counters = self.counters(operation, now);

        let calls = counters.calls.swap(0, Ordering::SeqCst);
        let failures = counters.failures.swap(0, Ordering::SeqCst);
        let total_latency_micros = counters.total_latency_micros.swap(0, Ordering::SeqCst);
        let active = counters.active.load(Ordering::SeqCst);

        let window_started = {
            let mut guard = counters.window_started_at.lock().unwrap();
            let started = *guard;
            *guard = now;
            started
        };
        let elapsed_secs = (now - window_started).num_milliseconds().max(1) as f64 / 1000.0;

        let throughput_per_sec = calls as f64 / elapsed_secs;
        let error_rate = if calls > 0 { failures as f64 / calls as f64 } else { 0.0 };
        let efficiency = 1.0 - error_rate;
        let mean_latency_ms = if calls > 0 {
            (total_latency_micros as f64 / calls as f64) / 1000.0
        } else {
            0.0
        };

        OperationReport {
            operation: operation.to_string(),
            throughput_per_sec,
            efficiency,
            mean_latency_ms,
            error_rate,
            active_concurrency: active,
        }
    }

    /// Whether the window for `operation` has elapsed `windowDuration` since
    /// it last reset, i.e. whether an adaptation loop should inspect it even
    /// without an explicit caller-driven trigger.
    pub fn window_elapsed(&self, operation: &str, now: DateTime<Utc>) -> bool {
        self.operations
            .get(operation)
            .map(|c| now - *c.window_started_at.lock().unwrap() >= self.window)
            .unwrap_or(false)
    }

    /// Deterministic rule table (spec.md §4.E). Recommendations are advice:
    /// this method has no side effect on the monitor or caller state.
    pub fn recommendations(report: &OperationReport) -> Recommendations {
        if report.efficiency > 0.9 && report.throughput_per_sec > 100.0 {
            Recommendations { batch_size: 500, concurrency: 200 }
        } else if report.efficiency > 0.8 && report.throughput_per_sec > 50.0 {
            Recommendations { batch_size: 300, concurrency: 100 }
        } else if report.efficiency > 0.7 {
            Recommendations { batch_size: 200, concurrency: 50 }
        } else {
            Recommendations { batch_size: 100, concurrency: 20 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_efficiency_and_latency() {
        let monitor = PerformanceMonitor::new();
        let t0 = Utc::now();
        for _ in 0..9 {
            monitor.start("sync", t0);
            monitor.complete("sync", std::time::Duration::from_millis(100), false, t0);
        }
        monitor.start("sync", t0);
        monitor.complete("sync", std::time::Duration::from_millis(100), true, t0);

        let report = monitor.snapshot("sync", t0 + chrono::Duration::seconds(1));
        assert!((report.error_rate - 0.1).abs() < 1e-9);
        assert!((report.efficiency - 0.9).abs() < 1e-9);
        assert_eq!(report.mean_latency_ms, 100.0);
    }

    #[test]
    fn recommendations_follow_the_rule_table() {
        let high = OperationReport {
            operation: "sync".into(),
            throughput_per_sec: 150.0,
            efficiency: 0.95,
            mean_latency_ms: 10.0,
            error_rate: 0.05,
            active_concurrency: 0,
        };
        assert_eq!(
            PerformanceMonitor::recommendations(&high),
            Recommendations { batch_size: 500, concurrency: 200 }
        );

        let low = OperationReport {
            operation: "sync".into(),
            throughput_per_sec: 10.0,
            efficiency: 0.5,
            mean_latency_ms: 10.0,
            error_rate: 0.5,
            active_concurrency: 0,
        };
        assert_eq!(
            PerformanceMonitor::recommendations(&low),
            Recommendations { batch_size: 100, concurrency: 20 }
        );
    }

    #[test]
    fn snapshot_resets_the_window() {
        let monitor = PerformanceMonitor::new();
        let t0 = Utc::now();
        monitor.start("sync", t0);
        monitor.complete("sync", std::time::Duration::from_millis(50), false, t0);
        let _ = monitor.snapshot("sync", t0 + chrono::Duration::seconds(1));

        let empty = monitor.snapshot("sync", t0 + chrono::Duration::seconds(2));
        assert_eq!(empty.throughput_per_sec, 0.0);
    }
}
