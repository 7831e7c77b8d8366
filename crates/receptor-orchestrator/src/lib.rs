//! Sync Orchestrator — component G (spec.md §4.G).
//!
//! Drives a scheduled run: pages stale candidates out of `AccountRepository`
//! (§4.G step 1), buffers them into batches sized by the Adaptive Resource
//! Manager's current `batchSize`, and fans each batch out through
//! `receptor_batch::run_batch` at the Manager's current `sync` permit count.
//! Each item is itself a structured-scope trio — fetch details / fetch
//! balance / (best-effort) fetch limits — merged into the persisted
//! `Account` and republished as an `AccountUpdated` event (§4.G step 3).

mod lock;

pub use lock::{SyncLock, STALE_AFTER};
pub use receptor_core::STALENESS_WINDOW;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use receptor_batch::{run_batch, run_scope, BatchResult, ScopeError};
use receptor_core::{
    Account, AccountIdentification, AccountRepository, AccountStatus, BalanceSnapshot, DomainEvent,
    EventHeader, InfraError, OverdraftLimit,
};
use receptor_events::EventPublisher;
use receptor_gateway::TransmitterPort;
use receptor_monitor::PerformanceMonitor;
use receptor_resource::{AdaptiveResourceManager, ResourceClassName};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

pub const ACCOUNT_UPDATES_TOPIC: &str = "account-updates";

/// Hard cap on one run's candidate page (spec.md §4.G step 1).
pub const MAX_CANDIDATES: usize = 1_000_000;

pub const DEFAULT_PER_ITEM_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SLACK: Duration = Duration::from_secs(5);

/// Per-batch line item appended to a [`SyncResult`] (spec.md §4.G step 4).
#[derive(Clone, Debug, Serialize)]
pub struct BatchSummary {
    pub batch_number: u32,
    pub size: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub wallclock_ms: u64,
}

/// Accumulated outcome of one scheduled run.
#[derive(Clone, Debug, Serialize)]
pub struct SyncResult {
    pub execution_id: String,
    pub batches: Vec<BatchSummary>,
    pub processed: u64,
    pub errors: u64,
    pub duration_ms: u64,
}

/// One leg of the fetch-details/fetch-balance/fetch-limits structured scope.
/// Carried as a single enum because [`receptor_batch::run_scope`] joins a
/// homogeneous `Vec<T>` of subtasks, and the three legs have different wire
/// shapes (spec.md §4.G step 3, GLOSSARY "Structured scope").
enum Leg {
    Details(receptor_gateway::AccountPayload),
    Balance(receptor_gateway::BalancePayload),
    Limits(Option<receptor_gateway::OverdraftPayload>),
}

type LegFuture = Pin<Box<dyn Future<Output = Result<Leg, InfraError>> + Send>>;
type LegTask = Box<dyn FnOnce() -> LegFuture + Send>;

/// Drives one named scheduled sync pipeline. Instantiate one per deployment
/// that needs an independent schedule/store pair (spec.md §9 "instantiate G
/// twice with disjoint configuration").
pub struct SyncOrchestrator {
    name: String,
    account_repo: Arc<dyn AccountRepository>,
    gateway: Arc<dyn TransmitterPort>,
    publisher: Arc<EventPublisher>,
    monitor: Arc<PerformanceMonitor>,
    resources: Arc<AdaptiveResourceManager>,
    lock: SyncLock,
    per_item_timeout: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        name: impl Into<String>,
        account_repo: Arc<dyn AccountRepository>,
        gateway: Arc<dyn TransmitterPort>,
        publisher: Arc<EventPublisher>,
        monitor: Arc<PerformanceMonitor>,
        resources: Arc<AdaptiveResourceManager>,
    ) -> Self {
        Self {
            name: name.into(),
            account_repo,
            gateway,
            publisher,
            monitor,
            resources,
            lock: SyncLock::default(),
            per_item_timeout: DEFAULT_PER_ITEM_TIMEOUT,
        }
    }

    /// Overrides the per-item HTTP timeout (`sync.timeoutSeconds`, spec.md
    /// §6); defaults to [`DEFAULT_PER_ITEM_TIMEOUT`] when unset.
    pub fn with_per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = timeout;
        self
    }

    /// One scheduled run (spec.md §4.G). Returns `None` if another execution
    /// for this orchestrator name is already in progress and not yet stale.
    pub async fn run(&self, now: DateTime<Utc>) -> Option<SyncResult> {
        let execution_id = Uuid::new_v4().to_string();
        let _guard = self.lock.try_acquire(&execution_id, now)?;

        info!(orchestrator = %self.name, execution_id = %execution_id, "sync run starting");
        let started = Instant::now();

        let candidates = match self.account_repo.find_accounts_for_update(MAX_CANDIDATES).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(execution_id = %execution_id, error = %e, "candidate scan failed, aborting run");
                self.publisher
                    .publish(DomainEvent::SyncError {
                        header: EventHeader::new(&execution_id, Uuid::new_v4(), "receptor-orchestrator"),
                        execution_id: execution_id.clone(),
                        detail: e.to_string(),
                    })
                    .await;
                return Some(SyncResult {
                    execution_id,
                    batches: Vec::new(),
                    processed: 0,
                    errors: 1,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
        };

        let batch_size = self.resources.current_batch_size().max(1) as usize;
        let mut batches = Vec::new();
        let mut processed = 0u64;
        let mut errors = 0u64;
        let mut batch_number = 0u32;

        for chunk in candidates.chunks(batch_size) {
            batch_number += 1;
            let chunk = chunk.to_vec();
            let chunk_len = chunk.len();
            let batch_started = Instant::now();
            let concurrency = self.resources.class(ResourceClassName::Sync).snapshot().current.max(1) as usize;

            let gateway = self.gateway.clone();
            let account_repo = self.account_repo.clone();
            let publisher = self.publisher.clone();
            let monitor = self.monitor.clone();

            let result: BatchResult<(), InfraError> = run_batch(
                chunk,
                concurrency,
                self.per_item_timeout,
                DEFAULT_SLACK,
                move |account: Account| {
                    let gateway = gateway.clone();
                    let account_repo = account_repo.clone();
                    let publisher = publisher.clone();
                    let monitor = monitor.clone();
                    async move {
                        let item_started = Instant::now();
                        let outcome =
                            sync_one_account(gateway, account_repo, publisher, account, now).await;
                        monitor.complete("sync", item_started.elapsed(), outcome.is_err(), now);
                        outcome
                    }
                },
            )
            .await;

            let success_count = result.successes();
            let error_count = result.failures() + result.cancelled();
            processed += success_count as u64;
            errors += error_count as u64;

            batches.push(BatchSummary {
                batch_number,
                size: chunk_len,
                success_count,
                error_count,
                wallclock_ms: batch_started.elapsed().as_millis() as u64,
            });
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.publisher
            .publish(DomainEvent::BatchSyncCompleted {
                header: EventHeader::new(&execution_id, Uuid::new_v4(), "receptor-orchestrator"),
                execution_id: execution_id.clone(),
                processed,
                errors,
                duration_ms,
            })
            .await;

        info!(execution_id = %execution_id, processed, errors, duration_ms, "sync run completed");
        Some(SyncResult { execution_id, batches, processed, errors, duration_ms })
    }

    pub fn current_holder(&self) -> Option<String> {
        self.lock.current_holder()
    }
}

/// One item's worth of work: structured-scope fetch trio, merge, persist,
/// publish (spec.md §4.G step 3).
async fn sync_one_account(
    gateway: Arc<dyn TransmitterPort>,
    account_repo: Arc<dyn AccountRepository>,
    publisher: Arc<EventPublisher>,
    mut account: Account,
    now: DateTime<Utc>,
) -> Result<(), InfraError> {
    let organization_id = account.organization_id.clone();
    let consent_id = account.consent_id.clone();
    let account_id = account.account_id.clone();

    let details_gateway = gateway.clone();
    let (o1, c1, a1) = (organization_id.clone(), consent_id.clone(), account_id.clone());
    let details_task: LegTask = Box::new(move || {
        Box::pin(async move {
            details_gateway
                .get_account(&o1, &c1, &a1)
                .await?
                .map(Leg::Details)
                .ok_or(InfraError::Unavailable)
        }) as LegFuture
    });

    let balance_gateway = gateway.clone();
    let (o2, c2, a2) = (organization_id.clone(), consent_id.clone(), account_id.clone());
    let balance_task: LegTask = Box::new(move || {
        Box::pin(async move {
            balance_gateway
                .get_balances(&o2, &c2, &a2)
                .await?
                .map(Leg::Balance)
                .ok_or(InfraError::Unavailable)
        }) as LegFuture
    });

    let limits_gateway = gateway.clone();
    let (o3, c3, a3) = (organization_id.clone(), consent_id.clone(), account_id.clone());
    let limits_task: LegTask = Box::new(move || {
        Box::pin(async move {
            // Best-effort: any failure here becomes an empty leg, never a
            // batch failure (spec.md §4.G step 3 "the limits leg is
            // best-effort").
            match limits_gateway.get_overdraft_limits(&o3, &c3, &a3).await {
                Ok(payload) => Ok(Leg::Limits(payload)),
                Err(_) => Ok(Leg::Limits(None)),
            }
        }) as LegFuture
    });

    let legs = run_scope(vec![details_task, balance_task, limits_task])
        .await
        .map_err(|e| match e {
            ScopeError::Failed(err) => err,
            ScopeError::Cancelled | ScopeError::Panicked => InfraError::Unavailable,
        })?;

    for leg in legs {
        match leg {
            Leg::Details(d) => {
                account.category = d.category;
                account.subtype = d.subtype;
                account.identification = AccountIdentification {
                    compe_code: d.compe_code,
                    branch_code: d.branch_code,
                    number: d.number,
                    check_digit: d.check_digit,
                };
            }
            Leg::Balance(b) => {
                account.balance = Some(BalanceSnapshot::new(
                    b.available_amount,
                    b.blocked_amount,
                    b.auto_invested_amount,
                    b.currency,
                    b.updated_at,
                ));
            }
            Leg::Limits(l) => {
                account.overdraft_limit = l.map(|o| OverdraftLimit {
                    total_limit: o.total_limit,
                    used_limit: o.used_limit,
                    currency: o.currency,
                });
            }
        }
    }

    account.status = AccountStatus::Active;
    account.last_synced_at = Some(now);

    account_repo
        .upsert(account.clone())
        .await
        .map_err(|_| InfraError::Unavailable)?;

    publisher
        .publish(DomainEvent::AccountUpdated {
            header: EventHeader::new(&account.account_id, Uuid::new_v4(), "receptor-orchestrator"),
            account_id: account.account_id.clone(),
            balance: account.balance.clone(),
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use receptor_core::AccountIdentification;
    use receptor_gateway::{AccountPayload, BalancePayload, OverdraftPayload};
    use receptor_testkit::{FakeTransmitter, InMemoryAccountRepository, InMemoryEventBroker};

    use super::*;

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            account_id: id.to_string(),
            consent_id: "urn:consent:1".into(),
            organization_id: "org-1".into(),
            category: "CONTA_DEPOSITO_A_VISTA".into(),
            subtype: "INDIVIDUAL".into(),
            identification: AccountIdentification {
                compe_code: "001".into(),
                branch_code: Some("0001".into()),
                number: "12345".into(),
                check_digit: "6".into(),
            },
            balance: None,
            overdraft_limit: None,
            status: AccountStatus::Active,
            last_synced_at: None,
            last_validated_at: None,
            last_monitored_at: None,
        }
    }

    fn account_payload() -> AccountPayload {
        AccountPayload {
            account_id: "acc-1".into(),
            category: "CONTA_DEPOSITO_A_VISTA".into(),
            subtype: "INDIVIDUAL".into(),
            compe_code: "001".into(),
            branch_code: Some("0001".into()),
            number: "12345".into(),
            check_digit: "6".into(),
        }
    }

    fn balance_payload() -> BalancePayload {
        BalancePayload {
            available_amount: 10_000,
            blocked_amount: 0,
            auto_invested_amount: 0,
            currency: "brl".into(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn s3_successful_sync_merges_and_publishes() {
        let account_repo = Arc::new(InMemoryAccountRepository::default());
        account_repo.upsert(account("acc-1")).await.unwrap();

        let gateway = Arc::new(FakeTransmitter::default());
        gateway.set_account("acc-1", Ok(account_payload()));
        gateway.set_balance("acc-1", Ok(balance_payload()));
        gateway.set_limits(
            "acc-1",
            Ok(OverdraftPayload { total_limit: 500_00, used_limit: 0, currency: "BRL".into() }),
        );

        let broker = Arc::new(InMemoryEventBroker::default());
        let publisher = Arc::new(EventPublisher::new(broker.clone(), ACCOUNT_UPDATES_TOPIC));
        let monitor = Arc::new(PerformanceMonitor::new());
        let resources = Arc::new(AdaptiveResourceManager::default());

        let orchestrator = SyncOrchestrator::new(
            "receptor-1",
            account_repo.clone(),
            gateway,
            publisher,
            monitor,
            resources,
        );

        let result = orchestrator.run(Utc::now()).await.unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.errors, 0);
        assert_eq!(result.batches.len(), 1);

        let stored = account_repo.get("acc-1").await.unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Active);
        assert_eq!(stored.balance.unwrap().currency, "BRL");

        let events = broker.events();
        assert!(events.iter().any(|e| matches!(e, DomainEvent::AccountUpdated { .. })));
        assert!(events.iter().any(|e| matches!(e, DomainEvent::BatchSyncCompleted { .. })));
    }

    #[tokio::test]
    async fn limits_failure_is_best_effort_and_does_not_fail_the_item() {
        let account_repo = Arc::new(InMemoryAccountRepository::default());
        account_repo.upsert(account("acc-2")).await.unwrap();

        let gateway = Arc::new(FakeTransmitter::default());
        gateway.set_account("acc-2", Ok(AccountPayload { account_id: "acc-2".into(), ..account_payload() }));
        gateway.set_balance("acc-2", Ok(balance_payload()));
        gateway.set_limits("acc-2", Err(InfraError::Unavailable));

        let broker = Arc::new(InMemoryEventBroker::default());
        let publisher = Arc::new(EventPublisher::new(broker, ACCOUNT_UPDATES_TOPIC));
        let monitor = Arc::new(PerformanceMonitor::new());
        let resources = Arc::new(AdaptiveResourceManager::default());

        let orchestrator = SyncOrchestrator::new(
            "receptor-1",
            account_repo.clone(),
            gateway,
            publisher,
            monitor,
            resources,
        );

        let result = orchestrator.run(Utc::now()).await.unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.errors, 0);

        let stored = account_repo.get("acc-2").await.unwrap().unwrap();
        assert!(stored.overdraft_limit.is_none());
    }

    #[tokio::test]
    async fn details_failure_fails_the_item_but_not_the_batch() {
        let account_repo = Arc::new(InMemoryAccountRepository::default());
        account_repo.upsert(account("acc-3")).await.unwrap();
        account_repo.upsert(account("acc-4")).await.unwrap();

        let gateway = Arc::new(FakeTransmitter::default());
        gateway.set_account("acc-3", Err(InfraError::Unauthorized));
        gateway.set_account("acc-4", Ok(AccountPayload { account_id: "acc-4".into(), ..account_payload() }));
        gateway.set_balance("acc-4", Ok(balance_payload()));

        let broker = Arc::new(InMemoryEventBroker::default());
        let publisher = Arc::new(EventPublisher::new(broker, ACCOUNT_UPDATES_TOPIC));
        let monitor = Arc::new(PerformanceMonitor::new());
        let resources = Arc::new(AdaptiveResourceManager::default());

        let orchestrator = SyncOrchestrator::new(
            "receptor-1",
            account_repo,
            gateway,
            publisher,
            monitor,
            resources,
        );

        let result = orchestrator.run(Utc::now()).await.unwrap();
        assert_eq!(result.processed, 1);
        assert_eq!(result.errors, 1);
    }

}
