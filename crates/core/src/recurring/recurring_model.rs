//! Recurring schedule domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::transactions::{BalanceEffect, Transaction, TransactionType};
use crate::utils::time_utils::utc_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl RecurrenceUnit {
    pub const ALL: [&'static str; 4] = ["daily", "weekly", "monthly", "yearly"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl FromStr for RecurrenceUnit {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(ValidationError::invalid_field(
                "reoccurrence",
                format!("unknown recurrence unit '{}'", other),
            )),
        }
    }
}

/// A recurrence attached to a base transaction.
///
/// `next_occurrence` is the cursor: the next calendar date that will produce
/// an instance. Once a schedule goes inactive it is never advanced again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSchedule {
    pub id: String,
    pub user_id: String,
    pub base_transaction_id: String,
    pub period_length: i32,
    #[serde(rename = "reoccurrence")]
    pub recurrence_unit: RecurrenceUnit,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_occurrence: NaiveDate,
    pub is_active: bool,
    #[serde(with = "utc_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_millis")]
    pub updated_at: DateTime<Utc>,
}

fn default_period_length() -> i32 {
    1
}

fn validate_period_length(period_length: i32) -> Result<(), ValidationError> {
    if period_length < 1 {
        return Err(ValidationError::invalid_field(
            "period_length",
            "must be at least 1",
        ));
    }
    Ok(())
}

pub(crate) fn validate_window(start_date: NaiveDate, end_date: Option<NaiveDate>) -> Result<(), ValidationError> {
    match end_date {
        Some(end) if end < start_date => Err(ValidationError::invalid_field(
            "end_date",
            "must not be before start_date",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecurringSchedule {
    pub base_transaction_id: uuid::Uuid,
    #[serde(default = "default_period_length")]
    pub period_length: i32,
    #[serde(rename = "reoccurrence", default)]
    pub recurrence_unit: RecurrenceUnit,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl NewRecurringSchedule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_period_length(self.period_length)?;
        validate_window(self.start_date, self.end_date)
    }
}

/// Present-but-null becomes `Some(None)`; an absent field stays `None`
/// through `#[serde(default)]`.
fn nullable_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Editable schedule fields; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurringScheduleUpdate {
    #[serde(default)]
    pub period_length: Option<i32>,
    #[serde(rename = "reoccurrence", default)]
    pub recurrence_unit: Option<RecurrenceUnit>,
    /// `Some(None)` clears the end date.
    #[serde(
        default,
        deserialize_with = "nullable_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl RecurringScheduleUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(period_length) = self.period_length {
            validate_period_length(period_length)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, schedule: &mut RecurringSchedule) -> Result<(), ValidationError> {
        self.validate()?;
        validate_window(schedule.start_date, self.end_date.unwrap_or(schedule.end_date))?;
        if let Some(period_length) = self.period_length {
            schedule.period_length = period_length;
        }
        if let Some(unit) = self.recurrence_unit {
            schedule.recurrence_unit = unit;
        }
        if let Some(end_date) = self.end_date {
            schedule.end_date = end_date;
        }
        if let Some(is_active) = self.is_active {
            schedule.is_active = is_active;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringScheduleList {
    pub items: Vec<RecurringSchedule>,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTriggerResult {
    pub processed_count: usize,
    pub created_transaction_ids: Vec<String>,
}

/// One materialized occurrence: the base transaction's financial fields
/// re-dated to the occurrence and linked back to its schedule by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInstance {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    pub category_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub amount: Decimal,
    pub title: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub is_income: bool,
    pub recurring_config_id: String,
}

impl TransactionInstance {
    pub fn from_base(base: &Transaction, schedule: &RecurringSchedule, date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: schedule.user_id.clone(),
            wallet_id: base.wallet_id.clone(),
            category_id: base.category_id.clone(),
            payment_method_id: base.payment_method_id.clone(),
            amount: base.amount,
            title: base.title.clone(),
            notes: base.notes.clone(),
            date,
            is_income: base.is_income,
            recurring_config_id: schedule.id.clone(),
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        TransactionType::RecurringInstance
    }

    pub fn balance_effect(&self) -> BalanceEffect {
        BalanceEffect::new(self.wallet_id.clone(), self.amount, self.is_income)
    }
}
