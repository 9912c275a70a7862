use async_trait::async_trait;

use super::{NewTransaction, Transaction, TransactionFilters, TransactionList, TransactionUpdate};
use crate::errors::Result;

/// Persistence for transactions. Write methods must run the balance guard in
/// the same unit of work as the row change.
#[async_trait]
pub trait TransactionRepositoryTrait: Send + Sync {
    /// Live (not soft-deleted) transaction owned by `user_id`.
    fn get_transaction(&self, user_id: &str, transaction_id: &str) -> Result<Transaction>;

    fn list_transactions(
        &self,
        user_id: &str,
        filters: &TransactionFilters,
    ) -> Result<TransactionList>;

    async fn create_transaction(
        &self,
        user_id: String,
        new_transaction: NewTransaction,
    ) -> Result<Transaction>;

    async fn update_transaction(
        &self,
        user_id: String,
        transaction_id: String,
        update: TransactionUpdate,
    ) -> Result<Transaction>;

    async fn delete_transaction(&self, user_id: String, transaction_id: String) -> Result<()>;
}

#[async_trait]
pub trait TransactionServiceTrait: Send + Sync {
    fn get_transaction(&self, user_id: &str, transaction_id: &str) -> Result<Transaction>;

    fn list_transactions(
        &self,
        user_id: &str,
        filters: TransactionFilters,
    ) -> Result<TransactionList>;

    async fn create_transaction(
        &self,
        user_id: &str,
        new_transaction: NewTransaction,
    ) -> Result<Transaction>;

    async fn update_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
        update: TransactionUpdate,
    ) -> Result<Transaction>;

    async fn delete_transaction(&self, user_id: &str, transaction_id: &str) -> Result<()>;
}
