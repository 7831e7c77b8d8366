//! Wire shapes returned by the transmitter's REST endpoints, normalized into
//! `receptor_core` domain types by the Sync Orchestrator — not the raw Open
//! Finance Brasil DTOs themselves (those live at the excluded HTTP boundary).

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct AccountPayload {
    pub account_id: String,
    pub category: String,
    pub subtype: String,
    pub compe_code: String,
    pub branch_code: Option<String>,
    pub number: String,
    pub check_digit: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BalancePayload {
    pub available_amount: i64,
    pub blocked_amount: i64,
    pub auto_invested_amount: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OverdraftPayload {
    pub total_limit: i64,
    pub used_limit: i64,
    pub currency: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransactionPayload {
    pub transaction_id: String,
    pub transaction_type: String,
    pub amount: i64,
    pub currency: String,
    pub transaction_date: DateTime<Utc>,
    pub counterparty_name: Option<String>,
    pub counterparty_document: Option<String>,
}
