//! Collaborator contracts (spec.md §1 "Deliberately out of scope" /
//! §9 "make the registry an explicit collaborator passed to constructors").
//!
//! Every storage engine, the directory-of-participants lookup, OAuth2 token
//! acquisition, and the concrete message broker are specified here purely by
//! the contract the core depends on. Implementations — sled/Postgres-backed,
//! HTTP-backed, Kafka-backed, or the in-memory test doubles in
//! `receptor-testkit` — live outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::account::Account;
use crate::consent::Consent;
use crate::error::{DomainError, InfraError};
use crate::event::DomainEvent;
use crate::transaction::Transaction;

/// Wall-clock abstraction so state-machine and adaptation logic is
/// deterministically testable (grounded in the same seam the Overpass
/// enrichment worker uses its injected `Clock` for).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Optimistic-concurrency-aware Consent store (spec.md §4.A).
#[async_trait]
pub trait ConsentRepository: Send + Sync {
    async fn get(&self, consent_id: &str) -> Result<Option<Consent>, DomainError>;

    /// Succeeds only if `expected_version` still matches the stored
    /// version; otherwise returns `ConcurrencyConflict` so the caller can
    /// retry once per spec.md §4.A.
    async fn compare_and_swap(
        &self,
        consent: Consent,
        expected_version: u64,
    ) -> Result<Consent, DomainError>;

    async fn insert(&self, consent: Consent) -> Result<Consent, DomainError>;

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Consent>, DomainError>;
}

/// Account/Resource store, including the stale-entity scan the Sync
/// Orchestrator drives (spec.md §4.G step 1).
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get(&self, account_id: &str) -> Result<Option<Account>, DomainError>;

    async fn upsert(&self, account: Account) -> Result<(), DomainError>;

    /// status = ACTIVE AND (lastUpdated IS NULL OR lastUpdated < now - 12h),
    /// ordered by lastUpdated ASC, capped by `limit` (spec.md §4.G step 1).
    async fn find_accounts_for_update(&self, limit: usize) -> Result<Vec<Account>, DomainError>;
}

/// Append-only transaction store; `insert` must reject a duplicate
/// `external_transaction_id` rather than overwrite (spec.md §3).
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert_if_absent(&self, transaction: Transaction) -> Result<bool, DomainError>;
}

/// Resolves an `organizationId` to the transmitter's base URL
/// (spec.md §4.C "Base URL resolution: delegated to the participants
/// collaborator").
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn base_url(&self, organization_id: &str) -> Result<String, InfraError>;
}

/// Lazily fetches and caches a client-credentials token per
/// `organizationId` (spec.md §4.C "Token provider").
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, organization_id: &str) -> Result<String, InfraError>;
}

/// Key-partitioned publish of normalized events (spec.md §4.H). An
/// implementation over Kafka/SNS/whatever is an external collaborator; this
/// crate only depends on the at-least-once, per-key-ordered contract.
#[async_trait]
pub trait EventBroker: Send + Sync {
    async fn publish(&self, topic: &str, event: DomainEvent) -> Result<(), InfraError>;
}
