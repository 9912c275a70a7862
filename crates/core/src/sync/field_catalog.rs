//! Column catalog for every syncable table.
//!
//! Pushed field maps are checked against this catalog before they reach
//! storage: client-local markers and server-managed keys are dropped, known
//! columns are coerced to their declared kind, anything else rejects the
//! change. Pull uses the same catalog to render stored rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

use super::SyncTable;
use crate::errors::ValidationError;
use crate::recurring::{validate_window, RecurrenceUnit};
use crate::transactions::{ledger::normalize_amount, TransactionType};
use crate::utils::time_utils::{format_date, format_utc_millis, parse_date, parse_utc};

pub const BUDGET_PERIODS: [&str; 4] = ["weekly", "monthly", "yearly", "custom"];
pub const OBJECTIVE_TYPES: [&str; 2] = ["goal", "loan"];

/// Keys a client may send that never reach storage.
pub const CLIENT_LOCAL_KEYS: [&str; 2] = ["sync_status", "local_id"];
pub const SERVER_MANAGED_KEYS: [&str; 5] = ["id", "user_id", "created_at", "updated_at", "deleted_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    NullableText,
    Bool,
    Integer,
    PositiveInteger,
    Decimal,
    Date,
    NullableDate,
    Timestamp,
    NullableTimestamp,
    Uuid,
    NullableUuid,
    /// Nullable JSON array stored as text.
    JsonArray,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be supplied on create.
    Required,
    /// Falls back to the column default on create.
    Optional,
    /// Written by the server only.
    ServerManaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub presence: Presence,
}

impl ColumnSpec {
    const fn new(name: &'static str, kind: ColumnKind, presence: Presence) -> Self {
        Self {
            name,
            kind,
            presence,
        }
    }

    pub fn is_client_writable(&self) -> bool {
        self.presence != Presence::ServerManaged
    }
}

use ColumnKind as K;
use Presence::{Optional as Opt, Required as Req};

const fn server(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec::new(name, kind, Presence::ServerManaged)
}

const fn col(name: &'static str, kind: ColumnKind, presence: Presence) -> ColumnSpec {
    ColumnSpec::new(name, kind, presence)
}

const CATEGORIES: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("name", K::Text, Req),
    col("icon_name", K::Text, Opt),
    col("color", K::Text, Opt),
    col("main_category_id", K::NullableUuid, Opt),
    col("is_income", K::Bool, Opt),
    col("order_index", K::Integer, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
    server("deleted_at", K::NullableTimestamp),
];

const WALLETS: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("name", K::Text, Req),
    col("icon_name", K::Text, Opt),
    col("color", K::Text, Opt),
    col("currency", K::Text, Opt),
    col("balance", K::Decimal, Opt),
    col("is_default", K::Bool, Opt),
    col("order_index", K::Integer, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
    server("deleted_at", K::NullableTimestamp),
];

const PAYMENT_METHODS: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("name", K::Text, Req),
    col("icon_name", K::Text, Opt),
    col("is_default", K::Bool, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
    server("deleted_at", K::NullableTimestamp),
];

const TRANSACTIONS: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("wallet_id", K::Uuid, Req),
    col("category_id", K::NullableUuid, Opt),
    col("payment_method_id", K::NullableUuid, Opt),
    col("amount", K::Decimal, Req),
    col("title", K::Text, Req),
    col("notes", K::NullableText, Opt),
    col("date", K::Timestamp, Req),
    col("is_income", K::Bool, Opt),
    col("type", K::Enum(&TransactionType::ALL), Opt),
    col("special_type", K::Integer, Opt),
    col("is_paid", K::Bool, Opt),
    col("original_due_date", K::NullableTimestamp, Opt),
    col("skip_paid", K::Bool, Opt),
    col("paired_transaction_id", K::NullableUuid, Opt),
    col("recurring_config_id", K::NullableUuid, Opt),
    col("receipt_image_url", K::NullableText, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
    server("deleted_at", K::NullableTimestamp),
];

const RECURRING_CONFIGS: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("base_transaction_id", K::Uuid, Req),
    col("period_length", K::PositiveInteger, Opt),
    col("reoccurrence", K::Enum(&RecurrenceUnit::ALL), Opt),
    col("start_date", K::Date, Req),
    col("end_date", K::NullableDate, Opt),
    col("next_occurrence", K::Date, Opt),
    col("is_active", K::Bool, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
];

const BUDGETS: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("name", K::Text, Req),
    col("amount", K::Decimal, Req),
    col("period", K::Enum(&BUDGET_PERIODS), Opt),
    col("start_date", K::Date, Req),
    col("end_date", K::NullableDate, Opt),
    col("wallet_ids", K::JsonArray, Opt),
    col("category_ids", K::JsonArray, Opt),
    col("is_income", K::Bool, Opt),
    col("is_pinned", K::Bool, Opt),
    col("is_archived", K::Bool, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
    server("deleted_at", K::NullableTimestamp),
];

const OBJECTIVES: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("wallet_id", K::NullableUuid, Opt),
    col("name", K::Text, Req),
    col("icon_name", K::Text, Opt),
    col("color", K::Text, Opt),
    col("target_amount", K::Decimal, Req),
    col("type", K::Enum(&OBJECTIVE_TYPES), Opt),
    col("start_date", K::Date, Req),
    col("end_date", K::NullableDate, Opt),
    col("is_pinned", K::Bool, Opt),
    col("is_archived", K::Bool, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
    server("deleted_at", K::NullableTimestamp),
];

const ASSOCIATED_TITLES: &[ColumnSpec] = &[
    server("id", K::Uuid),
    server("user_id", K::Uuid),
    col("title", K::Text, Req),
    col("category_id", K::Uuid, Req),
    col("is_exact_match", K::Bool, Opt),
    server("created_at", K::Timestamp),
    server("updated_at", K::Timestamp),
];

impl SyncTable {
    /// Every stored column, in table order.
    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            Self::Categories => CATEGORIES,
            Self::Wallets => WALLETS,
            Self::PaymentMethods => PAYMENT_METHODS,
            Self::Transactions => TRANSACTIONS,
            Self::RecurringConfigs => RECURRING_CONFIGS,
            Self::Budgets => BUDGETS,
            Self::Objectives => OBJECTIVES,
            Self::AssociatedTitles => ASSOCIATED_TITLES,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
        self.columns().iter().find(|column| column.name == name)
    }
}

/// A pushed value after coercion to its column kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Bool(bool),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl FieldValue {
    /// Wire rendering, matching what pull returns for the same column.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(text) => Value::String(text.clone()),
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Integer(number) => Value::from(*number),
            Self::Decimal(amount) => Value::String(amount.to_string()),
            Self::Date(date) => Value::String(format_date(date)),
            Self::Timestamp(ts) => Value::String(format_utc_millis(ts)),
            Self::Json(value) => value.clone(),
        }
    }
}

/// An ordered, validated column assignment list.
pub type Fields = Vec<(&'static str, FieldValue)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareMode {
    Create,
    Update,
}

fn is_stripped_key(key: &str) -> bool {
    CLIENT_LOCAL_KEYS.contains(&key) || SERVER_MANAGED_KEYS.contains(&key)
}

/// Validates a pushed `data` map for `table` and returns the column
/// assignments in catalog order.
pub fn prepare_fields(
    table: SyncTable,
    data: &Map<String, Value>,
    mode: PrepareMode,
) -> Result<Fields, ValidationError> {
    if let Some(unknown) = data
        .keys()
        .find(|key| !is_stripped_key(key) && table.column(key).is_none())
    {
        return Err(ValidationError::UnknownField {
            table: table.as_str().to_string(),
            field: unknown.clone(),
        });
    }

    let mut fields = Fields::new();
    for column in table.columns().iter().filter(|c| c.is_client_writable()) {
        match data.get(column.name) {
            Some(value) => fields.push((column.name, coerce(column, value)?)),
            None if mode == PrepareMode::Create && column.presence == Presence::Required => {
                return Err(ValidationError::MissingField(column.name.to_string()));
            }
            None => {}
        }
    }

    if mode == PrepareMode::Create && table == SyncTable::RecurringConfigs {
        default_next_occurrence(&mut fields);
        check_schedule_window(&fields)?;
    }

    Ok(fields)
}

fn default_next_occurrence(fields: &mut Fields) {
    if fields.iter().any(|(name, _)| *name == "next_occurrence") {
        return;
    }
    let start = fields
        .iter()
        .find(|(name, _)| *name == "start_date")
        .map(|(_, value)| value.clone());
    if let Some(start) = start {
        fields.push(("next_occurrence", start));
    }
}

fn date_field(fields: &Fields, name: &str) -> Option<NaiveDate> {
    fields.iter().find(|(column, _)| *column == name).and_then(|(_, value)| match value {
        FieldValue::Date(date) => Some(*date),
        _ => None,
    })
}

/// A pushed schedule obeys the same window rules as one created through
/// the recurring endpoints, and its cursor may not precede `start_date`.
fn check_schedule_window(fields: &Fields) -> Result<(), ValidationError> {
    let Some(start_date) = date_field(fields, "start_date") else {
        return Ok(());
    };
    validate_window(start_date, date_field(fields, "end_date"))?;
    match date_field(fields, "next_occurrence") {
        Some(cursor) if cursor < start_date => Err(ValidationError::invalid_field(
            "next_occurrence",
            "must not be before start_date",
        )),
        _ => Ok(()),
    }
}

fn kind_error(column: &ColumnSpec, expected: &str) -> ValidationError {
    ValidationError::invalid_field(column.name, format!("expected {}", expected))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_utc(raw).or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    })
}

fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    parse_date(raw).or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

fn coerce(column: &ColumnSpec, value: &Value) -> Result<FieldValue, ValidationError> {
    let nullable = matches!(
        column.kind,
        K::NullableText | K::NullableDate | K::NullableTimestamp | K::NullableUuid | K::JsonArray
    );
    if value.is_null() {
        return if nullable {
            Ok(FieldValue::Null)
        } else {
            Err(ValidationError::invalid_field(column.name, "must not be null"))
        };
    }

    match column.kind {
        K::Text | K::NullableText => value
            .as_str()
            .map(|text| FieldValue::Text(text.to_string()))
            .ok_or_else(|| kind_error(column, "a string")),
        K::Bool => match value {
            Value::Bool(flag) => Ok(FieldValue::Bool(*flag)),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Ok(FieldValue::Bool(false)),
                Some(1) => Ok(FieldValue::Bool(true)),
                _ => Err(kind_error(column, "a boolean")),
            },
            _ => Err(kind_error(column, "a boolean")),
        },
        K::Integer => value
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| kind_error(column, "an integer")),
        K::PositiveInteger => value
            .as_i64()
            .filter(|number| *number >= 1)
            .map(FieldValue::Integer)
            .ok_or_else(|| kind_error(column, "an integer of at least 1")),
        K::Decimal => {
            let raw = match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                _ => return Err(kind_error(column, "a decimal")),
            };
            let amount = Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map_err(|_| kind_error(column, "a decimal"))?;
            normalize_amount(amount)
                .map(FieldValue::Decimal)
                .map_err(|_| kind_error(column, "a decimal with at most 2 fractional digits"))
        }
        K::Date | K::NullableDate => value
            .as_str()
            .and_then(parse_calendar_date)
            .map(FieldValue::Date)
            .ok_or_else(|| kind_error(column, "a YYYY-MM-DD date")),
        K::Timestamp | K::NullableTimestamp => value
            .as_str()
            .and_then(parse_timestamp)
            .map(FieldValue::Timestamp)
            .ok_or_else(|| kind_error(column, "an ISO-8601 timestamp")),
        K::Uuid | K::NullableUuid => value
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(|id| FieldValue::Text(id.to_string()))
            .ok_or_else(|| kind_error(column, "a UUID")),
        K::JsonArray => match value {
            Value::Array(_) => Ok(FieldValue::Json(value.clone())),
            _ => Err(kind_error(column, "an array")),
        },
        K::Enum(allowed) => value
            .as_str()
            .filter(|raw| allowed.contains(raw))
            .map(|raw| FieldValue::Text(raw.to_string()))
            .ok_or_else(|| kind_error(column, &format!("one of {}", allowed.join(", ")))),
    }
}

/// Renders a stored row for pull. Storage hands back booleans as 0/1 and
/// JSON arrays as text; both are restored to their JSON shape here.
pub fn normalize_row(table: SyncTable, mut row: Map<String, Value>) -> Map<String, Value> {
    for column in table.columns() {
        let Some(value) = row.get_mut(column.name) else {
            continue;
        };
        match column.kind {
            K::Bool => {
                if let Some(number) = value.as_i64() {
                    *value = Value::Bool(number != 0);
                }
            }
            K::JsonArray => {
                if let Some(parsed) = value
                    .as_str()
                    .and_then(|text| serde_json::from_str::<Value>(text).ok())
                {
                    *value = parsed;
                }
            }
            K::Decimal => {
                if let Value::Number(number) = value {
                    *value = Value::String(number.to_string());
                }
            }
            _ => {}
        }
    }
    row
}
