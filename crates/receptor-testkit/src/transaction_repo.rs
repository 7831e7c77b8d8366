use async_trait::async_trait;
use dashmap::DashMap;
use receptor_core::{DomainError, Transaction, TransactionRepository};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: DashMap<String, Transaction>,
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert_if_absent(&self, transaction: Transaction) -> Result<bool, DomainError> {
        match self.transactions.entry(transaction.external_transaction_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(transaction);
                Ok(true)
            }
        }
    }
}
