//! receptor-core
//!
//! Domain model and collaborator contracts for the receptor-side data
//! synchronization engine. This crate owns no I/O: every repository,
//! directory lookup, token acquisition, and event broker is expressed as a
//! trait in [`ports`] so that storage engines, the directory-of-participants
//! service, OAuth2 token acquisition, and the concrete message broker stay
//! external collaborators, specified only by their contract.

pub mod account;
pub mod consent;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod job;
pub mod ports;
pub mod transaction;

pub use account::{Account, AccountIdentification, AccountStatus, BalanceSnapshot, OverdraftLimit};
pub use consent::{Consent, ConsentStatus, Permission, RejectionReason};
pub use error::{DomainError, InfraError, QueueError};
pub use event::{DomainEvent, EventHeader};
pub use idempotency::IdempotencyRecord;
pub use job::{JobKind, JobStatus, ProcessingJob};
pub use ports::{
    AccountRepository, Clock, ConsentRepository, EventBroker, ParticipantDirectory, SystemClock,
    TokenProvider, TransactionRepository,
};
pub use transaction::{CounterpartyInfo, Transaction, TransactionType};

/// Staleness horizon for account sync selection: `lastUpdated IS NULL OR
/// lastUpdated < now - 12h` (spec.md §4.G step 1). Shared between the
/// orchestrator and the repository adapters that implement the selection
/// predicate.
pub const STALENESS_WINDOW: chrono::Duration = chrono::Duration::hours(12);
