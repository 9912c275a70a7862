use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use super::{
    NewTransaction, Transaction, TransactionFilters, TransactionList, TransactionRepositoryTrait,
    TransactionServiceTrait, TransactionUpdate,
};
use crate::errors::{Result, ValidationError};

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Validates paging input against the listing limits.
pub fn page_bounds(skip: Option<i64>, limit: Option<i64>) -> Result<(i64, i64)> {
    let skip = skip.unwrap_or(0);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if skip < 0 {
        return Err(ValidationError::invalid_field("skip", "must be zero or greater").into());
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ValidationError::invalid_field(
            "limit",
            format!("must be between 1 and {}", MAX_PAGE_SIZE),
        )
        .into());
    }
    Ok((skip, limit))
}

pub struct TransactionService {
    repository: Arc<dyn TransactionRepositoryTrait>,
}

impl TransactionService {
    pub fn new(repository: Arc<dyn TransactionRepositoryTrait>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl TransactionServiceTrait for TransactionService {
    fn get_transaction(&self, user_id: &str, transaction_id: &str) -> Result<Transaction> {
        self.repository.get_transaction(user_id, transaction_id)
    }

    fn list_transactions(
        &self,
        user_id: &str,
        mut filters: TransactionFilters,
    ) -> Result<TransactionList> {
        let (skip, limit) = page_bounds(filters.skip, filters.limit)?;
        filters.skip = Some(skip);
        filters.limit = Some(limit);
        self.repository.list_transactions(user_id, &filters)
    }

    async fn create_transaction(
        &self,
        user_id: &str,
        mut new_transaction: NewTransaction,
    ) -> Result<Transaction> {
        new_transaction.validate()?;
        debug!(
            "Creating transaction '{}' in wallet {} for user {}",
            new_transaction.title, new_transaction.wallet_id, user_id
        );
        self.repository
            .create_transaction(user_id.to_string(), new_transaction)
            .await
    }

    async fn update_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
        mut update: TransactionUpdate,
    ) -> Result<Transaction> {
        update.validate()?;
        self.repository
            .update_transaction(user_id.to_string(), transaction_id.to_string(), update)
            .await
    }

    async fn delete_transaction(&self, user_id: &str, transaction_id: &str) -> Result<()> {
        self.repository
            .delete_transaction(user_id.to_string(), transaction_id.to_string())
            .await
    }
}
