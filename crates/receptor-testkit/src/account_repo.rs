use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use receptor_core::{Account, AccountRepository, AccountStatus, DomainError, STALENESS_WINDOW};

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: DashMap<String, Account>,
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn get(&self, account_id: &str) -> Result<Option<Account>, DomainError> {
        Ok(self.accounts.get(account_id).map(|a| a.value().clone()))
    }

    async fn upsert(&self, account: Account) -> Result<(), DomainError> {
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    /// `lastUpdated IS NULL OR lastUpdated < now - 12h` (spec.md §4.G step 1).
    async fn find_accounts_for_update(&self, limit: usize) -> Result<Vec<Account>, DomainError> {
        let cutoff = Utc::now() - STALENESS_WINDOW;
        let mut stale: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| entry.status == AccountStatus::Active)
            .filter(|entry| entry.last_synced_at.map_or(true, |t| t < cutoff))
            .map(|entry| entry.value().clone())
            .collect();
        stale.sort_by_key(|a| a.last_synced_at);
        stale.truncate(limit);
        Ok(stale)
    }
}
