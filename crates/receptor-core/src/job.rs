//! ProcessingJob — spec.md §3 and the Job Queue (component B, §4.B).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_RETRY: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLetter,
    Retrying,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::DeadLetter)
    }
}

/// What the job does once reserved. Kept deliberately small — the
/// per-account sync fan-out itself is driven by the Sync Orchestrator (G),
/// not by one job per account; a `JobKind::Sync` job represents one
/// scheduler-level batch-producing unit of work per `(consent_id,
/// organization_id)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Sync,
    BalanceUpdate,
    Discovery,
    Validation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    pub consent_id: String,
    pub organization_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_details: Option<String>,
}

impl ProcessingJob {
    pub fn new(
        id: String,
        consent_id: String,
        organization_id: String,
        kind: JobKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            consent_id,
            organization_id,
            kind,
            status: JobStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            next_retry_at: None,
            error_details: None,
        }
    }

    /// A PENDING job older than 24h is considered abandoned (spec.md §3).
    pub fn is_abandoned_pending(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && now - self.created_at > chrono::Duration::hours(24)
    }

    /// The dedup key used by `enqueue`'s idempotent-within-a-window rule
    /// (spec.md §4.B).
    pub fn dedup_key(&self) -> (String, String, JobKind) {
        (self.consent_id.clone(), self.organization_id.clone(), self.kind)
    }
}
