//! IdempotencyRecord — spec.md §3, §4.I.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub serialized_response: String,
    pub response_type: String,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl IdempotencyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at > chrono::Duration::seconds(self.ttl_seconds as i64)
    }
}
