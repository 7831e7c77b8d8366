//! Account / Resource and Balance snapshot — spec.md §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Discovered,
    Active,
    Suspended,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentification {
    pub compe_code: String,
    pub branch_code: Option<String>,
    pub number: String,
    pub check_digit: String,
}

/// (availableAmount, blockedAmount, autoInvestedAmount, currency, updatedAt).
/// Appended per sync; the account carries the most recent as a materialized
/// view (spec.md §3 "Balance snapshot").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub available_amount: i64,
    pub blocked_amount: i64,
    pub auto_invested_amount: i64,
    /// ISO-4217, always uppercased on construction (round-trip invariant,
    /// spec.md §8 property 6).
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn new(
        available_amount: i64,
        blocked_amount: i64,
        auto_invested_amount: i64,
        currency: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            available_amount,
            blocked_amount,
            auto_invested_amount,
            currency: currency.into().to_uppercase(),
            updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverdraftLimit {
    pub total_limit: i64,
    pub used_limit: i64,
    pub currency: String,
}

/// Internal representation of a data object owned by a customer at a
/// transmitter (spec.md §3 "Account / Resource").
///
/// `consent_id` is a weak reference: relation + lookup only, never
/// ownership — deleting a Consent does not cascade here, and nothing in this
/// crate dereferences it as a parent pointer (spec.md §9 "cyclic object
/// graphs").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub account_id: String,
    pub consent_id: String,
    pub organization_id: String,
    pub category: String,
    pub subtype: String,
    pub identification: AccountIdentification,
    pub balance: Option<BalanceSnapshot>,
    pub overdraft_limit: Option<OverdraftLimit>,
    pub status: AccountStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub last_monitored_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Derived shard key used to distribute `accounts` across a
    /// `clientId`-derived partition (spec.md §6 "Persisted state layout").
    pub fn partition_key(&self, client_id: &str) -> String {
        format!("{client_id}:{}", &self.organization_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_snapshot_uppercases_currency() {
        let snap = BalanceSnapshot::new(100, 0, 0, "brl", Utc::now());
        assert_eq!(snap.currency, "BRL");
    }
}
