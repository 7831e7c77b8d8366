//! Consent aggregate — §3 "Consent" and the lifecycle state machine driven by
//! [`crate::error::DomainError`] transitions (the transition function itself
//! lives in `receptor-consent`, which only depends on this shape).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed enum drawn from the Open Finance Brasil permission catalogue.
/// Non-exhaustive categories are intentionally not modeled — the catalogue is
/// closed per spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    AccountsRead,
    AccountsBalancesRead,
    AccountsTransactionsRead,
    AccountsOverdraftLimitsRead,
    CreditCardsAccountsRead,
    CreditCardsAccountsBillsRead,
    CreditCardsAccountsLimitsRead,
    CreditCardsAccountsTransactionsRead,
    LoansRead,
    FinancingsRead,
    ResourcesRead,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    AwaitingAuthorisation,
    Authorised,
    Rejected,
    Consumed,
    Revoked,
    Expired,
}

impl ConsentStatus {
    /// Terminal statuses never transition further (spec.md §4.A).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConsentStatus::Rejected | ConsentStatus::Revoked | ConsentStatus::Expired
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReason {
    pub code: String,
    pub info: String,
}

/// Consent aggregate root (spec.md §3).
///
/// `version` backs the optimistic concurrency scheme in §4.A: a caller reads
/// a Consent, attempts a transition against the `version` it read, and the
/// repository rejects a write whose `version` no longer matches the stored
/// one with [`crate::error::DomainError::ConcurrencyConflict`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Consent {
    pub consent_id: String,
    pub client_id: String,
    pub organization_id: String,
    pub customer_id: String,
    permissions: BTreeSet<Permission>,
    pub status: ConsentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status_updated_at: DateTime<Utc>,
    pub rejection_reason: Option<RejectionReason>,
    pub version: u64,
}

impl Consent {
    /// Construct a fresh consent in `AwaitingAuthorisation`.
    ///
    /// # Panics
    /// Panics if `permissions` is empty or `expires_at <= created_at` —
    /// callers at the boundary (the excluded HTTP controller layer) are
    /// expected to validate and surface `ValidationFailed` before ever
    /// reaching this constructor; invariants (i) and (ii) of §3 are enforced
    /// here as a last line of defense, not as the primary validation path.
    pub fn new(
        consent_id: String,
        client_id: String,
        organization_id: String,
        customer_id: String,
        permissions: BTreeSet<Permission>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        assert!(!permissions.is_empty(), "permissions set must be non-empty");
        if let Some(exp) = expires_at {
            assert!(exp > created_at, "expires_at must be after created_at");
        }
        Self {
            consent_id,
            client_id,
            organization_id,
            customer_id,
            permissions,
            status: ConsentStatus::AwaitingAuthorisation,
            created_at,
            expires_at,
            status_updated_at: created_at,
            rejection_reason: None,
            version: 0,
        }
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Invariant (iv): AUTHORISED and not expired ⇔ may gate data fetches.
    pub fn may_gate_fetches(&self, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Authorised
            && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms() -> BTreeSet<Permission> {
        [Permission::AccountsRead, Permission::AccountsBalancesRead]
            .into_iter()
            .collect()
    }

    #[test]
    fn new_consent_starts_awaiting_authorisation() {
        let now = Utc::now();
        let c = Consent::new(
            "urn:1".into(),
            "client".into(),
            "org".into(),
            "customer".into(),
            perms(),
            now,
            None,
        );
        assert_eq!(c.status, ConsentStatus::AwaitingAuthorisation);
        assert_eq!(c.version, 0);
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn new_consent_rejects_empty_permissions() {
        let now = Utc::now();
        Consent::new(
            "urn:1".into(),
            "client".into(),
            "org".into(),
            "customer".into(),
            BTreeSet::new(),
            now,
            None,
        );
    }

    #[test]
    fn may_gate_fetches_requires_authorised_and_unexpired() {
        let now = Utc::now();
        let mut c = Consent::new(
            "urn:1".into(),
            "client".into(),
            "org".into(),
            "customer".into(),
            perms(),
            now,
            Some(now + chrono::Duration::days(1)),
        );
        assert!(!c.may_gate_fetches(now));
        c.status = ConsentStatus::Authorised;
        assert!(c.may_gate_fetches(now));
        assert!(!c.may_gate_fetches(now + chrono::Duration::days(2)));
    }
}
