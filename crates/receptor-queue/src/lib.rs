//! Job Queue — component B (spec.md §4.B).
//!
//! The durable store itself (Postgres/whatever `SELECT ... FOR UPDATE SKIP
//! LOCKED` backend) is an external collaborator per spec.md §1; what this
//! crate owns is the *algorithm* — atomic disjoint-batch reservation,
//! retry/backoff/dead-letter transitions, and the abandonment sweep — against
//! an in-process store. A real backend swaps the storage, never the rules
//! below.
//!
//! Grounded in the OMS outbox/claim pattern (`other_examples` —
//! `Hartman25-MiniQuantDeskV4` core crate), which claims disjoint rows with a
//! `FOR UPDATE SKIP LOCKED` CTE and releases them back to pending on failure;
//! here a `DashMap` entry lock plays the same role a row lock does there —
//! claiming one job never blocks a concurrent claim of a different job.

mod error;

pub use error::QueueError;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use receptor_core::{JobKind, JobStatus, ProcessingJob};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reservation lease: a PROCESSING job not completed within this window is
/// considered abandoned by its worker and returned to PENDING (spec.md
/// §4.B).
pub const RESERVATION_LEASE: chrono::Duration = chrono::Duration::minutes(10);

/// A PENDING job older than this is dead — nothing is claiming it and it
/// will never complete on its own (spec.md §3).
pub const PENDING_ABANDONMENT: chrono::Duration = chrono::Duration::hours(24);

/// Exponential backoff base for `fail`'s `nextRetryAt` (spec.md §4.B).
pub const RETRY_BASE: chrono::Duration = chrono::Duration::seconds(2);

/// Idempotent-enqueue dedup window: a second `enqueue` for the same
/// `(consentId, organizationId, kind)` inside this window is dropped rather
/// than duplicated (spec.md §4.B).
pub const DEDUP_WINDOW: chrono::Duration = chrono::Duration::minutes(5);

struct Entry {
    job: ProcessingJob,
    /// Monotonic insertion sequence, used to break createdAt ties so
    /// `reserveBatch`'s ASC ordering is stable even within the same
    /// timestamp.
    sequence: u64,
}

/// In-process job store implementing the reservation/retry/sweep contract of
/// spec.md §4.B.
pub struct JobQueue {
    jobs: DashMap<String, Entry>,
    sequence: AtomicU64,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self { jobs: DashMap::new(), sequence: AtomicU64::new(0) }
    }
}

impl JobQueue {
    /// Idempotent by `(consentId, organizationId, kind)` within
    /// [`DEDUP_WINDOW`]; a duplicate inside the window is dropped and the
    /// existing job id returned instead.
    pub fn enqueue(&self, consent_id: &str, organization_id: &str, kind: JobKind, now: DateTime<Utc>) -> String {
        if let Some(existing) = self.jobs.iter().find(|e| {
            e.job.consent_id == consent_id
                && e.job.organization_id == organization_id
                && e.job.kind == kind
                && now - e.job.created_at < DEDUP_WINDOW
        }) {
            debug!(job_id = %existing.job.id, "duplicate enqueue dropped within dedup window");
            return existing.job.id.clone();
        }

        let job = ProcessingJob::new(
            Uuid::new_v4().to_string(),
            consent_id.to_string(),
            organization_id.to_string(),
            kind,
            now,
        );
        let id = job.id.clone();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.jobs.insert(id.clone(), Entry { job, sequence });
        info!(job_id = %id, %consent_id, %organization_id, ?kind, "job enqueued");
        id
    }

    /// Atomically claims up to `n` PENDING jobs, oldest first, flipping each
    /// to PROCESSING as it is claimed. Disjoint calls (racing workers) never
    /// observe or block on each other's claims beyond the brief per-shard
    /// lock `DashMap` itself takes — no reservation blocks a concurrent
    /// reservation of a *different* job (spec.md §4.B "skip-locked").
    pub fn reserve_batch(&self, n: usize, now: DateTime<Utc>) -> Vec<ProcessingJob> {
        let mut candidates: Vec<(String, DateTime<Utc>, u64)> = self
            .jobs
            .iter()
            .filter(|e| e.job.status == JobStatus::Pending)
            .map(|e| (e.job.id.clone(), e.job.created_at, e.sequence))
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        let mut reserved = Vec::with_capacity(n);
        for (id, ..) in candidates.into_iter().take(n) {
            if let Some(mut entry) = self.jobs.get_mut(&id) {
                if entry.job.status == JobStatus::Pending {
                    entry.job.status = JobStatus::Processing;
                    entry.job.updated_at = now;
                    reserved.push(entry.job.clone());
                }
            }
        }
        debug!(count = reserved.len(), "batch reserved");
        reserved
    }

    pub fn complete(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::Terminal(format!("unknown job {job_id}")))?;
        entry.job.status = JobStatus::Completed;
        entry.job.updated_at = now;
        Ok(())
    }

    /// Increments `retryCount`; at `>= MAX_RETRY` the job moves to
    /// DEAD_LETTER, otherwise FAILED with an exponentially-backed-off
    /// `nextRetryAt` (spec.md §4.B).
    pub fn fail(&self, job_id: &str, error: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::Terminal(format!("unknown job {job_id}")))?;
        entry.job.retry_count += 1;
        entry.job.updated_at = now;
        entry.job.error_details = Some(error.to_string());

        if entry.job.retry_count >= receptor_core::job::MAX_RETRY {
            entry.job.status = JobStatus::DeadLetter;
            entry.job.next_retry_at = None;
            warn!(job_id, retry_count = entry.job.retry_count, "job moved to dead letter");
        } else {
            entry.job.status = JobStatus::Retrying;
            let backoff = RETRY_BASE * 2i32.pow(entry.job.retry_count);
            entry.job.next_retry_at = Some(now + backoff);
        }
        Ok(())
    }

    /// Sweep: PROCESSING jobs whose lease expired go back to PENDING;
    /// PENDING jobs older than [`PENDING_ABANDONMENT`] go to DEAD_LETTER
    /// (spec.md §4.B). Returns the count of jobs moved by each rule.
    pub fn reap_abandoned(&self, now: DateTime<Utc>) -> (usize, usize) {
        let mut reclaimed = 0;
        let mut dead_lettered = 0;
        for mut entry in self.jobs.iter_mut() {
            match entry.job.status {
                JobStatus::Processing if now - entry.job.updated_at > RESERVATION_LEASE => {
                    entry.job.status = JobStatus::Pending;
                    entry.job.updated_at = now;
                    reclaimed += 1;
                }
                JobStatus::Pending if entry.job.is_abandoned_pending(now) => {
                    entry.job.status = JobStatus::DeadLetter;
                    entry.job.updated_at = now;
                    dead_lettered += 1;
                }
                JobStatus::Retrying
                    if entry.job.next_retry_at.map(|t| now >= t).unwrap_or(false) =>
                {
                    entry.job.status = JobStatus::Pending;
                }
                _ => {}
            }
        }
        if reclaimed > 0 || dead_lettered > 0 {
            info!(reclaimed, dead_lettered, "abandonment sweep completed");
        }
        (reclaimed, dead_lettered)
    }

    pub fn get(&self, job_id: &str) -> Option<ProcessingJob> {
        self.jobs.get(job_id).map(|e| e.job.clone())
    }

    /// Operator-facing drain of the dead-letter pile — not in spec.md's
    /// table, but a durable queue with no way back out of DEAD_LETTER is an
    /// obvious completeness gap (see SPEC_FULL.md §2).
    pub fn list_dead_letters(&self) -> Vec<ProcessingJob> {
        self.jobs
            .iter()
            .filter(|e| e.job.status == JobStatus::DeadLetter)
            .map(|e| e.job.clone())
            .collect()
    }

    /// Manually returns a dead-lettered job to PENDING with its retry count
    /// reset, for operator-triggered replay. Never automatic.
    pub fn requeue_dead_letter(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::Terminal(format!("unknown job {job_id}")))?;
        if entry.job.status != JobStatus::DeadLetter {
            return Err(QueueError::Terminal(format!(
                "job {job_id} is not in dead letter (status {:?})",
                entry.job.status
            )));
        }
        entry.job.status = JobStatus::Pending;
        entry.job.retry_count = 0;
        entry.job.next_retry_at = None;
        entry.job.error_details = None;
        entry.job.updated_at = now;
        info!(job_id, "dead letter job requeued by operator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dedup_within_window_returns_same_id() {
        let q = JobQueue::default();
        let now = Utc::now();
        let id1 = q.enqueue("c1", "org1", JobKind::Sync, now);
        let id2 = q.enqueue("c1", "org1", JobKind::Sync, now + chrono::Duration::seconds(1));
        assert_eq!(id1, id2);
        assert_eq!(q.jobs.len(), 1);
    }

    #[test]
    fn enqueue_outside_window_creates_new_job() {
        let q = JobQueue::default();
        let now = Utc::now();
        let id1 = q.enqueue("c1", "org1", JobKind::Sync, now);
        let id2 = q.enqueue("c1", "org1", JobKind::Sync, now + chrono::Duration::minutes(10));
        assert_ne!(id1, id2);
    }

    #[test]
    fn s5_reserve_batch_claims_are_disjoint_and_ordered() {
        let q = JobQueue::default();
        let t0 = Utc::now();
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(q.enqueue(&format!("c{i}"), "org1", JobKind::Sync, t0 + chrono::Duration::seconds(i)));
        }

        let batch_a = q.reserve_batch(4, t0 + chrono::Duration::seconds(20));
        let batch_b = q.reserve_batch(4, t0 + chrono::Duration::seconds(20));

        let ids_a: std::collections::HashSet<_> = batch_a.iter().map(|j| j.id.clone()).collect();
        let ids_b: std::collections::HashSet<_> = batch_b.iter().map(|j| j.id.clone()).collect();
        assert!(ids_a.is_disjoint(&ids_b));
        assert_eq!(batch_a.len(), 4);
        assert_eq!(batch_b.len(), 4);

        // oldest-first: batch_a must be the first four enqueued
        assert_eq!(
            ids_a,
            ids[0..4].iter().cloned().collect::<std::collections::HashSet<_>>()
        );
    }

    #[test]
    fn fail_below_max_retry_schedules_backoff_then_dead_letters() {
        let q = JobQueue::default();
        let t0 = Utc::now();
        let id = q.enqueue("c1", "org1", JobKind::Sync, t0);
        q.reserve_batch(1, t0);

        q.fail(&id, "boom", t0).unwrap();
        let job = q.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Retrying);
        assert_eq!(job.retry_count, 1);
        assert!(job.next_retry_at.unwrap() > t0);

        q.fail(&id, "boom", t0).unwrap();
        q.fail(&id, "boom", t0).unwrap();
        let job = q.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert_eq!(job.retry_count, 3);
    }

    #[test]
    fn reap_abandoned_reclaims_expired_leases_and_dead_letters_stale_pending() {
        let q = JobQueue::default();
        let t0 = Utc::now();
        let processing_id = q.enqueue("c1", "org1", JobKind::Sync, t0);
        q.reserve_batch(1, t0);

        let stale_pending_id = q.enqueue("c2", "org1", JobKind::BalanceUpdate, t0 - chrono::Duration::hours(25));

        let later = t0 + RESERVATION_LEASE + chrono::Duration::minutes(1);
        let (reclaimed, dead_lettered) = q.reap_abandoned(later);
        assert_eq!(reclaimed, 1);
        assert_eq!(dead_lettered, 1);
        assert_eq!(q.get(&processing_id).unwrap().status, JobStatus::Pending);
        assert_eq!(q.get(&stale_pending_id).unwrap().status, JobStatus::DeadLetter);
    }

    #[test]
    fn requeue_dead_letter_resets_retry_state() {
        let q = JobQueue::default();
        let t0 = Utc::now();
        let id = q.enqueue("c1", "org1", JobKind::Sync, t0);
        q.reserve_batch(1, t0);
        for _ in 0..3 {
            q.fail(&id, "boom", t0).unwrap();
        }
        assert_eq!(q.get(&id).unwrap().status, JobStatus::DeadLetter);

        q.requeue_dead_letter(&id, t0).unwrap();
        let job = q.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
    }
}
