//! Error taxonomy — spec.md §7. Tagged variants, not strings: domain errors
//! map to HTTP 4xx at the (excluded) controller boundary, infrastructure
//! errors map to 503, queue errors distinguish retryable from terminal.

use thiserror::Error;

use crate::consent::ConsentStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        from: ConsentStatus,
        to: ConsentStatus,
    },

    #[error("consent already rejected")]
    AlreadyRejected,

    #[error("consent already authorised")]
    AlreadyAuthorised,

    #[error("validation failed on {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("concurrency conflict")]
    ConcurrencyConflict,
}

impl DomainError {
    /// Stable `code` string for the 4xx body shape in spec.md §6/§7.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "RECURSO_NAO_ENCONTRADO",
            DomainError::InvalidStatusTransition { .. } => "TRANSICAO_DE_STATUS_INVALIDA",
            DomainError::AlreadyRejected => "CONSENTIMENTO_EM_STATUS_REJEITADO",
            DomainError::AlreadyAuthorised => "CONSENTIMENTO_EM_STATUS_AUTORIZADO",
            DomainError::ValidationFailed { .. } => "PARAMETRO_INVALIDO",
            DomainError::ConcurrencyConflict => "CONFLITO_DE_CONCORRENCIA",
        }
    }

    /// The HTTP status a controller would map this to (spec.md §6, §7).
    pub fn http_status(&self) -> u16 {
        match self {
            DomainError::NotFound(_) => 404,
            DomainError::ConcurrencyConflict => 409,
            _ => 422,
        }
    }
}

/// Infrastructure-layer failures, surfaced primarily by the Transmitter
/// Gateway (component C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error("service unavailable")]
    Unavailable,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found upstream")]
    NotFound,

    #[error("rate limited")]
    RateLimited,

    #[error("transient server error (status {0})")]
    TransientServerError(u16),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("timeout")]
    Timeout,
}

impl InfraError {
    /// Verbs/status combinations the retry policy in §4.C is allowed to
    /// retry: network/5xx/timeout, and 408/429 among 4xx.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InfraError::TransientServerError(_) | InfraError::Timeout | InfraError::RateLimited
        )
    }

    /// All infrastructure errors are 503 with a generic title at the
    /// (excluded) controller boundary (spec.md §7).
    pub fn http_status(&self) -> u16 {
        503
    }
}

/// Job Queue failure kinds (spec.md §7 "Queue kinds").
#[derive(Debug, Error, Clone)]
pub enum QueueError {
    #[error("retryable: {0}")]
    Retryable(String),

    #[error("terminal: {0}")]
    Terminal(String),
}
