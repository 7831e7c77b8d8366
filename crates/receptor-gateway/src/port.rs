use async_trait::async_trait;
use receptor_core::InfraError;

use crate::{AccountPayload, BalancePayload, OverdraftPayload, TransactionPayload};

/// The four read calls the Sync Orchestrator (G) needs from component C,
/// factored out as a trait so G depends on a contract rather than the
/// concrete `reqwest`-backed gateway — the same seam `receptor_core::ports`
/// draws around every other external collaborator.
#[async_trait]
pub trait TransmitterPort: Send + Sync {
    async fn get_account(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<AccountPayload>, InfraError>;

    async fn get_balances(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<BalancePayload>, InfraError>;

    async fn get_overdraft_limits(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Option<OverdraftPayload>, InfraError>;

    async fn get_transactions(
        &self,
        organization_id: &str,
        consent_id: &str,
        account_id: &str,
    ) -> Result<Vec<TransactionPayload>, InfraError>;
}
