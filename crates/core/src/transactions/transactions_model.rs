//! Transaction domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::transactions::ledger::normalize_amount;
use crate::utils::time_utils::{utc_millis, utc_millis_option};

pub const TITLE_MAX_LEN: usize = 200;
pub const RECEIPT_URL_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Regular,
    Transfer,
    RecurringInstance,
}

impl TransactionType {
    pub const ALL: [&'static str; 3] = ["regular", "transfer", "recurring_instance"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Transfer => "transfer",
            Self::RecurringInstance => "recurring_instance",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "regular" => Ok(Self::Regular),
            "transfer" => Ok(Self::Transfer),
            "recurring_instance" => Ok(Self::RecurringInstance),
            other => Err(ValidationError::invalid_field(
                "type",
                format!("unknown transaction type '{}'", other),
            )),
        }
    }
}

/// A persisted financial transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    pub category_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub amount: Decimal,
    pub title: String,
    pub notes: Option<String>,
    #[serde(with = "utc_millis")]
    pub date: DateTime<Utc>,
    pub is_income: bool,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub special_type: i32,
    pub is_paid: bool,
    #[serde(with = "utc_millis_option")]
    pub original_due_date: Option<DateTime<Utc>>,
    pub skip_paid: bool,
    pub paired_transaction_id: Option<String>,
    pub recurring_config_id: Option<String>,
    pub receipt_image_url: Option<String>,
    #[serde(with = "utc_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_millis")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "utc_millis_option")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

fn default_true() -> bool {
    true
}

/// Input for a user-entered transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub wallet_id: uuid::Uuid,
    #[serde(default)]
    pub category_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub payment_method_id: Option<uuid::Uuid>,
    pub amount: Decimal,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "utc_millis")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub is_income: bool,
    #[serde(rename = "type", default)]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub special_type: i32,
    #[serde(default = "default_true")]
    pub is_paid: bool,
    #[serde(default, with = "utc_millis_option")]
    pub original_due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skip_paid: bool,
    #[serde(default)]
    pub paired_transaction_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub recurring_config_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub receipt_image_url: Option<String>,
}

impl NewTransaction {
    /// Checks field constraints and rescales the amount to the ledger scale.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.amount = normalize_amount(self.amount)?;
        validate_title(&self.title)?;
        validate_receipt_url(self.receipt_image_url.as_deref())?;
        Ok(())
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    #[serde(default)]
    pub wallet_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub category_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub payment_method_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, with = "utc_millis_option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_income: Option<bool>,
    #[serde(default)]
    pub special_type: Option<i32>,
    #[serde(default)]
    pub is_paid: Option<bool>,
    #[serde(default)]
    pub skip_paid: Option<bool>,
    #[serde(default)]
    pub receipt_image_url: Option<String>,
}

impl TransactionUpdate {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if let Some(amount) = self.amount {
            self.amount = Some(normalize_amount(amount)?);
        }
        if let Some(title) = self.title.as_deref() {
            validate_title(title)?;
        }
        validate_receipt_url(self.receipt_image_url.as_deref())?;
        Ok(())
    }

    /// Applies the present fields onto `target`.
    pub fn apply_to(&self, target: &mut Transaction) {
        if let Some(wallet_id) = self.wallet_id {
            target.wallet_id = wallet_id.to_string();
        }
        if let Some(category_id) = self.category_id {
            target.category_id = Some(category_id.to_string());
        }
        if let Some(payment_method_id) = self.payment_method_id {
            target.payment_method_id = Some(payment_method_id.to_string());
        }
        if let Some(amount) = self.amount {
            target.amount = amount;
        }
        if let Some(title) = &self.title {
            target.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            target.notes = Some(notes.clone());
        }
        if let Some(date) = self.date {
            target.date = date;
        }
        if let Some(is_income) = self.is_income {
            target.is_income = is_income;
        }
        if let Some(special_type) = self.special_type {
            target.special_type = special_type;
        }
        if let Some(is_paid) = self.is_paid {
            target.is_paid = is_paid;
        }
        if let Some(skip_paid) = self.skip_paid {
            target.skip_paid = skip_paid;
        }
        if let Some(url) = &self.receipt_image_url {
            target.receipt_image_url = Some(url.clone());
        }
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = title.chars().count();
    if len == 0 || len > TITLE_MAX_LEN {
        return Err(ValidationError::invalid_field(
            "title",
            format!("length must be between 1 and {} characters", TITLE_MAX_LEN),
        ));
    }
    Ok(())
}

fn validate_receipt_url(url: Option<&str>) -> Result<(), ValidationError> {
    match url {
        Some(url) if url.chars().count() > RECEIPT_URL_MAX_LEN => {
            Err(ValidationError::invalid_field(
                "receipt_image_url",
                format!("must be at most {} characters", RECEIPT_URL_MAX_LEN),
            ))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilters {
    pub wallet_id: Option<uuid::Uuid>,
    pub is_income: Option<bool>,
    pub transaction_type: Option<TransactionType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionList {
    pub items: Vec<Transaction>,
    pub total: i64,
}
