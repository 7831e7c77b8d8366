//! Transaction — immutable once persisted (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyInfo {
    pub name: Option<String>,
    pub document: Option<String>,
}

/// `external_transaction_id` is unique and enforces dedup on ingest — a
/// repository implementation rejects a second insert under the same id
/// rather than silently overwriting (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub external_transaction_id: String,
    pub account_id: String,
    pub transaction_type: TransactionType,
    /// Always positive; sign is carried by `transaction_type`.
    pub amount: i64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub counterparty: Option<CounterpartyInfo>,
}
