use async_trait::async_trait;
use dashmap::DashMap;
use receptor_core::InfraError;
use receptor_gateway::{AccountPayload, BalancePayload, OverdraftPayload, TransactionPayload, TransmitterPort};

/// A scripted double for [`TransmitterPort`]: every response is registered
/// up front per `accountId`, so orchestrator tests can drive exact
/// success/failure combinations across the details/balance/limits trio
/// without standing up an HTTP server.
#[derive(Default)]
pub struct FakeTransmitter {
    accounts: DashMap<String, Result<AccountPayload, InfraError>>,
    balances: DashMap<String, Result<BalancePayload, InfraError>>,
    limits: DashMap<String, Result<OverdraftPayload, InfraError>>,
}

impl FakeTransmitter {
    pub fn set_account(&self, account_id: &str, result: Result<AccountPayload, InfraError>) {
        self.accounts.insert(account_id.to_string(), result);
    }

    pub fn set_balance(&self, account_id: &str, result: Result<BalancePayload, InfraError>) {
        self.balances.insert(account_id.to_string(), result);
    }

    pub fn set_limits(&self, account_id: &str, result: Result<OverdraftPayload, InfraError>) {
        self.limits.insert(account_id.to_string(), result);
    }
}

#[async_trait]
impl TransmitterPort for FakeTransmitter {
    async fn get_account(
        &self,
        _organization_id: &str,
        _consent_id: &str,
        account_id: &str,
    ) -> Result<Option<AccountPayload>, InfraError> {
        match self.accounts.get(account_id) {
            Some(entry) => entry.value().clone().map(Some),
            None => Ok(None),
        }
    }

    async fn get_balances(
        &self,
        _organization_id: &str,
        _consent_id: &str,
        account_id: &str,
    ) -> Result<Option<BalancePayload>, InfraError> {
        match self.balances.get(account_id) {
            Some(entry) => entry.value().clone().map(Some),
            None => Ok(None),
        }
    }

    async fn get_overdraft_limits(
        &self,
        _organization_id: &str,
        _consent_id: &str,
        account_id: &str,
    ) -> Result<Option<OverdraftPayload>, InfraError> {
        match self.limits.get(account_id) {
            Some(entry) => entry.value().clone().map(Some),
            None => Ok(None),
        }
    }

    async fn get_transactions(
        &self,
        _organization_id: &str,
        _consent_id: &str,
        _account_id: &str,
    ) -> Result<Vec<TransactionPayload>, InfraError> {
        Ok(Vec::new())
    }
}
