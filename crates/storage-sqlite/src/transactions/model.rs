//! Database models for transactions and the wallet balances they move.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use accountant_core::transactions::{NewTransaction, Transaction, TransactionType};
use accountant_core::utils::time_utils::{format_utc_millis, parse_utc};

use crate::errors::StorageError;

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct TransactionDB {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    pub category_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub amount: String,
    pub title: String,
    pub notes: Option<String>,
    pub date: String,
    pub is_income: bool,
    pub transaction_type: String,
    pub special_type: i32,
    pub is_paid: bool,
    pub original_due_date: Option<String>,
    pub skip_paid: bool,
    pub paired_transaction_id: Option<String>,
    pub recurring_config_id: Option<String>,
    pub receipt_image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

pub(crate) fn timestamp_from_db(
    column: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, StorageError> {
    parse_utc(value).ok_or_else(|| StorageError::corrupt(column, value))
}

pub(crate) fn optional_timestamp_from_db(
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(|raw| timestamp_from_db(column, raw)).transpose()
}

pub(crate) fn decimal_from_db(column: &'static str, value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value).map_err(|_| StorageError::corrupt(column, value))
}

impl TryFrom<TransactionDB> for Transaction {
    type Error = StorageError;

    fn try_from(db: TransactionDB) -> Result<Self, Self::Error> {
        Ok(Transaction {
            amount: decimal_from_db("amount", &db.amount)?,
            date: timestamp_from_db("date", &db.date)?,
            transaction_type: TransactionType::from_str(&db.transaction_type)
                .map_err(|_| StorageError::corrupt("type", db.transaction_type.clone()))?,
            original_due_date: optional_timestamp_from_db(
                "original_due_date",
                db.original_due_date.as_deref(),
            )?,
            created_at: timestamp_from_db("created_at", &db.created_at)?,
            updated_at: timestamp_from_db("updated_at", &db.updated_at)?,
            deleted_at: optional_timestamp_from_db("deleted_at", db.deleted_at.as_deref())?,
            id: db.id,
            user_id: db.user_id,
            wallet_id: db.wallet_id,
            category_id: db.category_id,
            payment_method_id: db.payment_method_id,
            title: db.title,
            notes: db.notes,
            is_income: db.is_income,
            special_type: db.special_type,
            is_paid: db.is_paid,
            skip_paid: db.skip_paid,
            paired_transaction_id: db.paired_transaction_id,
            recurring_config_id: db.recurring_config_id,
            receipt_image_url: db.receipt_image_url,
        })
    }
}

impl From<&Transaction> for TransactionDB {
    fn from(tx: &Transaction) -> Self {
        TransactionDB {
            id: tx.id.clone(),
            user_id: tx.user_id.clone(),
            wallet_id: tx.wallet_id.clone(),
            category_id: tx.category_id.clone(),
            payment_method_id: tx.payment_method_id.clone(),
            amount: tx.amount.to_string(),
            title: tx.title.clone(),
            notes: tx.notes.clone(),
            date: format_utc_millis(&tx.date),
            is_income: tx.is_income,
            transaction_type: tx.transaction_type.as_str().to_string(),
            special_type: tx.special_type,
            is_paid: tx.is_paid,
            original_due_date: tx.original_due_date.as_ref().map(format_utc_millis),
            skip_paid: tx.skip_paid,
            paired_transaction_id: tx.paired_transaction_id.clone(),
            recurring_config_id: tx.recurring_config_id.clone(),
            receipt_image_url: tx.receipt_image_url.clone(),
            created_at: format_utc_millis(&tx.created_at),
            updated_at: format_utc_millis(&tx.updated_at),
            deleted_at: tx.deleted_at.as_ref().map(format_utc_millis),
        }
    }
}

/// Builds the stored form of a validated user-entered transaction.
pub fn new_transaction_record(
    id: String,
    user_id: String,
    input: NewTransaction,
    now: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id,
        user_id,
        wallet_id: input.wallet_id.to_string(),
        category_id: input.category_id.map(|id| id.to_string()),
        payment_method_id: input.payment_method_id.map(|id| id.to_string()),
        amount: input.amount,
        title: input.title,
        notes: input.notes,
        date: input.date,
        is_income: input.is_income,
        transaction_type: input.transaction_type,
        special_type: input.special_type,
        is_paid: input.is_paid,
        original_due_date: input.original_due_date,
        skip_paid: input.skip_paid,
        paired_transaction_id: input.paired_transaction_id.map(|id| id.to_string()),
        recurring_config_id: input.recurring_config_id.map(|id| id.to_string()),
        receipt_image_url: input.receipt_image_url,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::wallets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WalletBalanceDB {
    pub id: String,
    pub balance: String,
    pub deleted_at: Option<String>,
}
