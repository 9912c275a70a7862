use async_trait::async_trait;
use chrono::{Days, Utc};
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::warn;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use accountant_core::errors::{Error, Result};
use accountant_core::transactions::{
    ledger, BalanceEffect, BalanceStore, NewTransaction, Transaction, TransactionFilters,
    TransactionList, TransactionRepositoryTrait, TransactionUpdate,
};
use accountant_core::utils::time_utils::{format_date, format_utc_millis};

use super::model::{decimal_from_db, new_transaction_record, TransactionDB, WalletBalanceDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{transactions, wallets};

/// Wallet balances of one user, adjusted through the open write transaction.
pub struct WalletBalances<'a> {
    conn: &'a mut SqliteConnection,
    user_id: &'a str,
}

impl<'a> WalletBalances<'a> {
    pub fn new(conn: &'a mut SqliteConnection, user_id: &'a str) -> Self {
        Self { conn, user_id }
    }
}

impl BalanceStore for WalletBalances<'_> {
    fn adjust_balance(&mut self, wallet_id: &str, delta: Decimal) -> Result<()> {
        let wallet = wallets::table
            .filter(wallets::id.eq(wallet_id))
            .filter(wallets::user_id.eq(self.user_id))
            .select(WalletBalanceDB::as_select())
            .first::<WalletBalanceDB>(self.conn)
            .optional()
            .map_err(StorageError::from)?;
        let Some(wallet) = wallet else {
            warn!(
                "Wallet {} of user {} not found; balance change of {} skipped",
                wallet_id, self.user_id, delta
            );
            return Ok(());
        };

        let mut balance = decimal_from_db("balance", &wallet.balance)? + delta;
        balance.rescale(ledger::LEDGER_SCALE);
        diesel::update(wallets::table.find(&wallet.id))
            .set((
                wallets::balance.eq(balance.to_string()),
                wallets::updated_at.eq(format_utc_millis(&Utc::now())),
            ))
            .execute(self.conn)
            .map_err(StorageError::from)?;
        Ok(())
    }
}

/// Checks that `wallet_id` is a live wallet of `user_id`.
pub fn ensure_wallet(conn: &mut SqliteConnection, user_id: &str, wallet_id: &str) -> Result<()> {
    let exists = wallets::table
        .filter(wallets::id.eq(wallet_id))
        .filter(wallets::user_id.eq(user_id))
        .filter(wallets::deleted_at.is_null())
        .select(wallets::id)
        .first::<String>(conn)
        .optional()
        .map_err(StorageError::from)?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(Error::not_found("Wallet"))
    }
}

/// Loads a live transaction of `user_id`.
pub fn find_live_transaction(
    conn: &mut SqliteConnection,
    user_id: &str,
    transaction_id: &str,
) -> Result<Option<Transaction>> {
    transactions::table
        .filter(transactions::id.eq(transaction_id))
        .filter(transactions::user_id.eq(user_id))
        .filter(transactions::deleted_at.is_null())
        .select(TransactionDB::as_select())
        .first::<TransactionDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .map(|row| Transaction::try_from(row).map_err(Error::from))
        .transpose()
}

fn filtered<'a>(user_id: &'a str, filters: &'a TransactionFilters) -> transactions::BoxedQuery<'a, Sqlite> {
    let mut query = transactions::table
        .filter(transactions::user_id.eq(user_id))
        .filter(transactions::deleted_at.is_null())
        .into_boxed();
    if let Some(wallet_id) = filters.wallet_id {
        query = query.filter(transactions::wallet_id.eq(wallet_id.to_string()));
    }
    if let Some(is_income) = filters.is_income {
        query = query.filter(transactions::is_income.eq(is_income));
    }
    if let Some(transaction_type) = filters.transaction_type {
        query = query.filter(transactions::transaction_type.eq(transaction_type.as_str()));
    }
    if let Some(start) = filters.start_date {
        query = query.filter(transactions::date.ge(format_date(&start)));
    }
    if let Some(end) = filters.end_date.and_then(|end| end.checked_add_days(Days::new(1))) {
        query = query.filter(transactions::date.lt(format_date(&end)));
    }
    query
}

pub struct TransactionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TransactionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        TransactionRepository { pool, writer }
    }
}

#[async_trait]
impl TransactionRepositoryTrait for TransactionRepository {
    fn get_transaction(&self, user_id: &str, transaction_id: &str) -> Result<Transaction> {
        let mut conn = get_connection(&self.pool)?;
        find_live_transaction(&mut conn, user_id, transaction_id)?
            .ok_or_else(|| Error::not_found("Transaction"))
    }

    fn list_transactions(
        &self,
        user_id: &str,
        filters: &TransactionFilters,
    ) -> Result<TransactionList> {
        let mut conn = get_connection(&self.pool)?;
        let total = filtered(user_id, filters)
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        let rows = filtered(user_id, filters)
            .order((transactions::date.desc(), transactions::created_at.desc()))
            .offset(filters.skip.unwrap_or(0))
            .limit(filters.limit.unwrap_or(100))
            .select(TransactionDB::as_select())
            .load::<TransactionDB>(&mut conn)
            .map_err(StorageError::from)?;
        let items = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(TransactionList { items, total })
    }

    async fn create_transaction(
        &self,
        user_id: String,
        new_transaction: NewTransaction,
    ) -> Result<Transaction> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Transaction> {
                ensure_wallet(conn, &user_id, &new_transaction.wallet_id.to_string())?;
                let transaction = new_transaction_record(
                    Uuid::new_v4().to_string(),
                    user_id.clone(),
                    new_transaction,
                    Utc::now(),
                );
                diesel::insert_into(transactions::table)
                    .values(TransactionDB::from(&transaction))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                ledger::apply(
                    &mut WalletBalances::new(conn, &user_id),
                    &BalanceEffect::of(&transaction),
                )?;
                Ok(transaction)
            })
            .await
    }

    async fn update_transaction(
        &self,
        user_id: String,
        transaction_id: String,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Transaction> {
                let mut transaction = find_live_transaction(conn, &user_id, &transaction_id)?
                    .ok_or_else(|| Error::not_found("Transaction"))?;
                if let Some(wallet_id) = update.wallet_id {
                    ensure_wallet(conn, &user_id, &wallet_id.to_string())?;
                }

                let old_effect = BalanceEffect::of(&transaction);
                update.apply_to(&mut transaction);
                transaction.updated_at = Utc::now();
                let new_effect = BalanceEffect::of(&transaction);

                diesel::update(transactions::table.find(&transaction.id))
                    .set(TransactionDB::from(&transaction))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                ledger::reapply(&mut WalletBalances::new(conn, &user_id), &old_effect, &new_effect)?;
                Ok(transaction)
            })
            .await
    }

    async fn delete_transaction(&self, user_id: String, transaction_id: String) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let transaction = find_live_transaction(conn, &user_id, &transaction_id)?
                    .ok_or_else(|| Error::not_found("Transaction"))?;
                let now = format_utc_millis(&Utc::now());
                diesel::update(transactions::table.find(&transaction.id))
                    .set((
                        transactions::deleted_at.eq(Some(now.clone())),
                        transactions::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                ledger::reverse(
                    &mut WalletBalances::new(conn, &user_id),
                    &BalanceEffect::of(&transaction),
                )?;
                Ok(())
            })
            .await
    }
}
