//! DomainEvent — tagged variants with a common header (spec.md §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::BalanceSnapshot;
use crate::consent::RejectionReason;

/// Common header carried by every event, regardless of variant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub aggregate_id: String,
    pub correlation_id: Uuid,
    pub source: String,
    pub schema_version: u16,
}

impl EventHeader {
    pub fn new(aggregate_id: impl Into<String>, correlation_id: Uuid, source: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            aggregate_id: aggregate_id.into(),
            correlation_id,
            source: source.to_string(),
            schema_version: 1,
        }
    }
}

/// Tagged event bodies. Each variant carries only normalized domain data —
/// no raw transmitter payloads, no internal ids that leak storage layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum DomainEvent {
    ConsentCreated { header: EventHeader, consent_id: String },
    ConsentAuthorised { header: EventHeader, consent_id: String },
    ConsentRejected {
        header: EventHeader,
        consent_id: String,
        reason: RejectionReason,
    },
    ConsentRevoked {
        header: EventHeader,
        consent_id: String,
        reason: Option<RejectionReason>,
    },
    ConsentExpired { header: EventHeader, consent_id: String },
    ConsentConsumed { header: EventHeader, consent_id: String },
    AccountUpdated {
        header: EventHeader,
        account_id: String,
        balance: Option<BalanceSnapshot>,
    },
    BatchSyncCompleted {
        header: EventHeader,
        execution_id: String,
        processed: u64,
        errors: u64,
        duration_ms: u64,
    },
    SyncError {
        header: EventHeader,
        execution_id: String,
        detail: String,
    },
}

impl DomainEvent {
    /// The key used for key-partitioned publishing (spec.md §4.H) —
    /// `accountId` for account events, `consentId` for consent events.
    pub fn partition_key(&self) -> &str {
        match self {
            DomainEvent::ConsentCreated { consent_id, .. }
            | DomainEvent::ConsentAuthorised { consent_id, .. }
            | DomainEvent::ConsentRejected { consent_id, .. }
            | DomainEvent::ConsentRevoked { consent_id, .. }
            | DomainEvent::ConsentExpired { consent_id, .. }
            | DomainEvent::ConsentConsumed { consent_id, .. } => consent_id,
            DomainEvent::AccountUpdated { account_id, .. } => account_id,
            DomainEvent::BatchSyncCompleted { execution_id, .. }
            | DomainEvent::SyncError { execution_id, .. } => execution_id,
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            DomainEvent::ConsentCreated { header, .. }
            | DomainEvent::ConsentAuthorised { header, .. }
            | DomainEvent::ConsentRejected { header, .. }
            | DomainEvent::ConsentRevoked { header, .. }
            | DomainEvent::ConsentExpired { header, .. }
            | DomainEvent::ConsentConsumed { header, .. }
            | DomainEvent::AccountUpdated { header, .. }
            | DomainEvent::BatchSyncCompleted { header, .. }
            | DomainEvent::SyncError { header, .. } => header,
        }
    }
}
