//! Wires every component named in spec.md §2 into one set of long-lived
//! handles, bundled into a single struct the way a node's shared state is
//! usually bundled for whatever driver loop calls into it.
//!
//! The inbound HTTP controller boundary (consent management, spec.md §6) is
//! explicitly out of scope, so `consent_service` and `job_queue`'s `enqueue`
//! side have no caller inside this binary — they're constructed and ready
//! for an embedder (an HTTP layer, a test harness) to drive. The autonomous
//! loops that need no external trigger — the sync cron, the resource
//! adaptation loop, and the queue's abandonment sweep — run unconditionally
//! once [`Pipeline::run_forever`] is called.

use std::sync::Arc;

use chrono::Utc;
use receptor_consent::ConsentService;
use receptor_core::{AccountRepository, Clock, ConsentRepository, EventBroker, SystemClock};
use receptor_events::EventPublisher;
use receptor_gateway::{TransmitterGateway, TransmitterPort};
use receptor_monitor::PerformanceMonitor;
use receptor_orchestrator::{SyncOrchestrator, ACCOUNT_UPDATES_TOPIC};
use receptor_queue::JobQueue;
use receptor_resilience::CachedTokenProvider;
use receptor_resource::AdaptiveResourceManager;
use receptor_testkit::{
    InMemoryAccountRepository, InMemoryConsentRepository, InMemoryEventBroker,
    InMemoryParticipantDirectory, InMemoryTokenProvider,
};
use tracing::{info, warn};

use crate::config::ReceptorConfig;

pub struct Pipeline {
    pub consent_service: Arc<ConsentService>,
    pub consent_repo: Arc<dyn ConsentRepository>,
    pub account_repo: Arc<dyn AccountRepository>,
    pub job_queue: Arc<JobQueue>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub resources: Arc<AdaptiveResourceManager>,
    pub monitor: Arc<PerformanceMonitor>,
    pub publisher: Arc<EventPublisher>,
    pub clock: Arc<dyn Clock>,
    pub config: ReceptorConfig,
}

impl Pipeline {
    /// Assembles the pipeline against the in-memory adapters in
    /// `receptor-testkit`. A deployment swaps these for real storage, a real
    /// directory-of-participants client, and a real OAuth2-backed
    /// `TokenProvider` without changing anything below this constructor —
    /// every collaborator is injected as a trait object (spec.md §9 "make
    /// the registry an explicit collaborator passed to constructors").
    pub fn bootstrap(config: ReceptorConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let directory = Arc::new(InMemoryParticipantDirectory::default());
        let token_provider = Arc::new(CachedTokenProvider::new(Arc::new(InMemoryTokenProvider)));
        let gateway: Arc<dyn TransmitterPort> =
            Arc::new(TransmitterGateway::new(directory, token_provider));

        let account_repo: Arc<dyn AccountRepository> = Arc::new(InMemoryAccountRepository::default());
        let consent_repo: Arc<dyn ConsentRepository> = Arc::new(InMemoryConsentRepository::default());
        let broker: Arc<dyn EventBroker> = Arc::new(InMemoryEventBroker::default());

        let consent_service = Arc::new(ConsentService::new(consent_repo.clone(), broker.clone(), clock.clone()));
        let publisher = Arc::new(EventPublisher::new(broker, ACCOUNT_UPDATES_TOPIC));
        let monitor = Arc::new(PerformanceMonitor::new());
        let resources = Arc::new(AdaptiveResourceManager::from_config(&config.resource_config()));
        let job_queue = Arc::new(JobQueue::default());

        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                "receptor-primary",
                account_repo.clone(),
                gateway,
                publisher.clone(),
                monitor.clone(),
                resources.clone(),
            )
            .with_per_item_timeout(config.sync_timeout()),
        );

        Self {
            consent_service,
            consent_repo,
            account_repo,
            job_queue,
            orchestrator,
            resources,
            monitor,
            publisher,
            clock,
            config,
        }
    }

    /// Runs the three autonomous loops to completion of the process (they
    /// never return under normal operation) and blocks until a shutdown
    /// signal arrives.
    pub async fn run_forever(self) {
        let pipeline = Arc::new(self);

        tokio::spawn(sync_cron(pipeline.clone()));
        tokio::spawn(resource_adaptation_loop(pipeline.clone()));
        tokio::spawn(queue_worker(pipeline.clone()));
        tokio::spawn(abandonment_sweep_loop(pipeline.clone()));

        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, draining outbox before exit");
        }
        let drained = pipeline.publisher.drain_outbox().await;
        if drained > 0 {
            info!(drained, "outbox drained on shutdown");
        }
    }
}

/// component G's scheduled trigger (spec.md §4.G, default every 12h).
async fn sync_cron(pipeline: Arc<Pipeline>) {
    let mut ticker = tokio::time::interval(pipeline.config.sync_interval());
    loop {
        ticker.tick().await;
        let now = pipeline.clock.now();
        match pipeline.orchestrator.run(now).await {
            Some(result) => info!(
                execution_id = %result.execution_id,
                processed = result.processed,
                errors = result.errors,
                duration_ms = result.duration_ms,
                "sync cron tick completed"
            ),
            None => warn!(
                holder = ?pipeline.orchestrator.current_holder(),
                "sync cron tick skipped, a run is already in progress"
            ),
        }
    }
}

/// component D's control loop (spec.md §4.D): wakes every
/// `adaptationInterval`, which itself narrows or widens as the loop runs, so
/// the sleep duration is re-read on every iteration rather than fixed at
/// startup.
async fn resource_adaptation_loop(pipeline: Arc<Pipeline>) {
    loop {
        tokio::time::sleep(pipeline.resources.adaptation_interval()).await;
        let now = Utc::now();
        let report = pipeline.monitor.snapshot("sync", now);
        let (cpu_load, mem_used_ratio) = sample_system_load();
        pipeline.resources.adapt(&report, cpu_load, mem_used_ratio);
    }
}

/// component B's reservation loop: reserves a batch of PENDING jobs and
/// dispatches each by kind. `JobKind::Sync` jobs drive the orchestrator
/// directly (the alternative data-flow path spec.md §2 allows — "G reserves
/// a batch from B" — alongside the cron-driven direct scan this binary also
/// runs); the remaining kinds have no deeper handler specified beyond
/// persisting their completion, since discovery/validation/balance-update
/// fetch shapes are not specified past what G already implements.
async fn queue_worker(pipeline: Arc<Pipeline>) {
    let mut ticker = tokio::time::interval(pipeline.config.queue_poll_interval());
    loop {
        ticker.tick().await;
        let now = pipeline.clock.now();
        let batch = pipeline.job_queue.reserve_batch(pipeline.config.queue_batch_size, now);
        if batch.is_empty() {
            continue;
        }
        info!(count = batch.len(), "job queue worker reserved batch");
        for job in batch {
            let outcome = match job.kind {
                receptor_core::JobKind::Sync => match pipeline.orchestrator.run(now).await {
                    Some(result) if result.errors == 0 => Ok(()),
                    Some(result) => Err(format!("{} item(s) failed", result.errors)),
                    None => Err("orchestrator already running".to_string()),
                },
                receptor_core::JobKind::Discovery
                | receptor_core::JobKind::BalanceUpdate
                | receptor_core::JobKind::Validation => Ok(()),
            };

            match outcome {
                Ok(()) => {
                    let _ = pipeline.job_queue.complete(&job.id, now);
                }
                Err(detail) => {
                    warn!(job_id = %job.id, kind = ?job.kind, error = %detail, "job failed");
                    let _ = pipeline.job_queue.fail(&job.id, &detail, now);
                }
            }
        }
    }
}

async fn abandonment_sweep_loop(pipeline: Arc<Pipeline>) {
    let mut ticker = tokio::time::interval(pipeline.config.abandonment_sweep_interval());
    loop {
        ticker.tick().await;
        let now = pipeline.clock.now();
        let (reclaimed, dead_lettered) = pipeline.job_queue.reap_abandoned(now);
        if reclaimed > 0 || dead_lettered > 0 {
            info!(reclaimed, dead_lettered, "abandonment sweep moved jobs");
        }
    }
}

/// Best-effort CPU/memory sampling for component D's pressure signal. The
/// concrete observability backend is an external collaborator (spec.md §1);
/// on platforms without `/proc/loadavg` this degrades to reporting no
/// pressure rather than failing the adaptation loop.
fn sample_system_load() -> (f64, f64) {
    let cpu_load = std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|line| line.split_whitespace().next().map(str::to_string))
        .and_then(|s| s.parse::<f64>().ok())
        .map(|load1| (load1 / num_cpus()).min(1.0))
        .unwrap_or(0.0);
    (cpu_load, 0.0)
}

fn num_cpus() -> f64 {
    std::thread::available_parallelism().map(|n| n.get() as f64).unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_wires_a_runnable_pipeline() {
        let pipeline = Pipeline::bootstrap(ReceptorConfig::default());
        let now = pipeline.clock.now();
        let result = pipeline.orchestrator.run(now).await.unwrap();
        assert_eq!(result.processed, 0);
        assert_eq!(result.errors, 0);
    }
}
