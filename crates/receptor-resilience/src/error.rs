use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("rate limited")]
    RateLimited,

    #[error("bulkhead saturated for shard {0}")]
    BulkheadSaturated(String),

    #[error("circuit open")]
    CircuitOpen,

    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
