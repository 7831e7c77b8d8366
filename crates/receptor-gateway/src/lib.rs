//! Transmitter Gateway — component C (spec.md §4.C).
//!
//! Composes the resilience stack outside-in for every outbound call:
//! Rate Limiter → Bulkhead → Circuit Breaker → Retry → Token-Bound Request →
//! Timeout. The HTTP client itself is `reqwest`, matching the teacher's
//! outbound-call layer; base URL resolution and token acquisition are
//! delegated to the injected `ParticipantDirectory`/`TokenProvider` ports.

mod models;
mod port;

pub use models::{AccountPayload, BalancePayload, OverdraftPayload, TransactionPayload};
pub use port::TransmitterPort;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use receptor_core::{InfraError, ParticipantDirectory};
use receptor_resilience::{Admission, Bulkhead, CachedTokenProvider, CircuitBreaker, RateLimiter, RetryPolicy};
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TransmitterGateway {
    directory: Arc<dyn ParticipantDirectory>,
    token_provider: Arc<CachedTokenProvider>,
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    bulkhead: Bulkhead,
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl TransmitterGateway {
    pub fn new(directory: Arc<dyn ParticipantDirectory>, token_provider: Arc<CachedTokenProvider>) -> Self {
        Self {
            directory,
            token_provider,
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::default_policy(),
            bulkhead: Bulkhead::default_policy(),
            circuit_breakers: DashMap::new(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn circuit_breaker(&self, organization_id: &str) -> Arc<CircuitBreaker> {
        self.circuit_breakers
            .entry(organization_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::default()))
            .clone()
    }

    pub async fn get_account(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<AccountPayload>, InfraError> {
        self.dispatch_read(organization_id, consent_id, "accounts", &format!("/accounts/{account_id}"))
            .await
    }

    pub async fn get_balances(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<BalancePayload>, InfraError> {
        self.dispatch_read(
            organization_id,
            consent_id,
            "accounts",
            &format!("/accounts/{account_id}/balances"),
        )
        .await
    }

    pub async fn get_overdraft_limits(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<OverdraftPayload>, InfraError> {
        self.dispatch_read(
            organization_id,
            consent_id,
            "accounts",
            &format!("/accounts/{account_id}/overdraft-limits"),
        )
        .await
    }

    pub async fn get_transactions(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Vec<TransactionPayload>, InfraError> {
        let result: Result<Option<Vec<TransactionPayload>>, InfraError> = self
            .dispatch_read(
                organization_id,
                consent_id,
                "accounts",
                &format!("/accounts/{account_id}/transactions"),
            )
            .await;
        Ok(result?.unwrap_or_default())
    }
}

#[async_trait]
impl TransmitterPort for TransmitterGateway {
    async fn get_account(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<AccountPayload>, InfraError> {
        TransmitterGateway::get_account(self, organization_id, consent_id, account_id).await
    }

    async fn get_balances(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<BalancePayload>, InfraError> {
        TransmitterGateway::get_balances(self, organization_id, consent_id, account_id).await
    }

    async fn get_overdraft_limits(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<OverdraftPayload>, InfraError> {
        TransmitterGateway::get_overdraft_limits(self, organization_id, consent_id, account_id).await
    }

    async fn get_transactions(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Vec<TransactionPayload>, InfraError> {
        TransmitterGateway::get_transactions(self, organization_id, consent_id, account_id).await
    }
}

impl TransmitterGateway {
    /// Shared read path: on circuit-open the gateway returns `Ok(None)`
    /// rather than an error — spec.md §4.C's fallback policy for read-only
    /// "get" endpoints.
    async fn dispatch_read<T: serde::de::DeserializeOwned>(
        &self,
        organization_id: &str,
        consent_id: &str,
        api_family: &str,
        path: &str,
    ) -> Result<Option<T>, InfraError> {
        self.rate_limiter.acquire().await.map_err(|_| InfraError::RateLimited)?;

        let _permit = match self.bulkhead.acquire(organization_id, api_family).await {
            Ok(permit) => permit,
            Err(_) => return Err(InfraError::Unavailable),
        };

        let breaker = self.circuit_breaker(organization_id);
        let now = chrono::Utc::now();
        match breaker.try_acquire(now) {
            Ok(Admission::Admitted) => {}
            Err(_) => {
                debug!(organization_id, "circuit open, returning empty result for read endpoint");
                return Ok(None);
            }
        }

        let base_url = self.directory.base_url(organization_id).await?;
        let url = format!("{base_url}{path}");

        let outcome = self
            .retry
            .run(|| self.send_once(organization_id, consent_id, &url, breaker.as_ref()))
            .await;

        match outcome {
            Ok(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| InfraError::ProtocolError(e.to_string())),
            Err(InfraError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_once(
        &self,
        organization_id: &str,
        consent_id: &str,
        url: &str,
        breaker: &CircuitBreaker,
    ) -> Result<String, InfraError> {
        let token = self.token_provider_token(organization_id).await?;
        let started = Instant::now();

        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .get(url)
                .header("x-fapi-interaction-id", Uuid::new_v4().to_string())
                .header("Authorization", format!("Bearer {token}"))
                .header("consent-id", consent_id)
                .send(),
        )
        .await;

        let elapsed = started.elapsed();

        let result = match response {
            Err(_) => Err(InfraError::Timeout),
            Ok(Err(e)) => Err(classify_transport_error(&e)),
            Ok(Ok(resp)) => classify_response(resp).await,
        };

        breaker.record(result.is_err(), elapsed, chrono::Utc::now());
        result
    }

    async fn token_provider_token(&self, organization_id: &str) -> Result<String, InfraError> {
        use receptor_core::TokenProvider;
        self.token_provider.token(organization_id).await
    }
}

fn classify_transport_error(error: &reqwest::Error) -> InfraError {
    if error.is_timeout() {
        InfraError::Timeout
    } else {
        InfraError::TransientServerError(0)
    }
}

async fn classify_response(response: reqwest::Response) -> Result<String, InfraError> {
    let status = response.status();
    if status.is_success() {
        return response
            .text()
            .await
            .map_err(|e| InfraError::ProtocolError(e.to_string()));
    }
    match status.as_u16() {
        401 => Err(InfraError::Unauthorized),
        403 => Err(InfraError::Forbidden),
        404 => Err(InfraError::NotFound),
        408 | 429 => Err(InfraError::RateLimited),
        500..=599 => Err(InfraError::TransientServerError(status.as_u16())),
        other => {
            warn!(status = other, "unexpected transmitter response status");
            Err(InfraError::ProtocolError(format!("unexpected status {other}")))
        }
    }
}
