//! Client sync protocol models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ValidationError;
use crate::utils::time_utils::{utc_millis, utc_millis_option};

/// Tables clients may push to and pull from, in foreign-key order.
pub const SYNC_TABLES: [&str; 8] = [
    "categories",
    "wallets",
    "payment_methods",
    "transactions",
    "recurring_configs",
    "budgets",
    "objectives",
    "associated_titles",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    Categories,
    Wallets,
    PaymentMethods,
    Transactions,
    RecurringConfigs,
    Budgets,
    Objectives,
    AssociatedTitles,
}

impl SyncTable {
    /// Same order as [`SYNC_TABLES`].
    pub const ALL: [SyncTable; 8] = [
        Self::Categories,
        Self::Wallets,
        Self::PaymentMethods,
        Self::Transactions,
        Self::RecurringConfigs,
        Self::Budgets,
        Self::Objectives,
        Self::AssociatedTitles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Wallets => "wallets",
            Self::PaymentMethods => "payment_methods",
            Self::Transactions => "transactions",
            Self::RecurringConfigs => "recurring_configs",
            Self::Budgets => "budgets",
            Self::Objectives => "objectives",
            Self::AssociatedTitles => "associated_titles",
        }
    }

    /// Whether rows carry a `deleted_at` column. Tables without one are
    /// hard-deleted on a pushed delete.
    pub fn supports_soft_delete(&self) -> bool {
        !matches!(self, Self::RecurringConfigs | Self::AssociatedTitles)
    }
}

impl FromStr for SyncTable {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|table| table.as_str() == value)
            .ok_or_else(|| ValidationError::UnknownTable(value.to_string()))
    }
}

impl std::fmt::Display for SyncTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

/// One client-side mutation. `id` is the client's own identifier for the
/// row; `server_id` is absent until the server has minted one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncChange {
    pub id: Uuid,
    #[serde(default)]
    pub server_id: Option<Uuid>,
    pub action: SyncAction,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(with = "utc_millis")]
    pub client_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPushRequest {
    pub table: String,
    pub changes: Vec<SyncChange>,
    #[serde(default)]
    pub client_version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    UpdateConflict,
    DeleteConflict,
}

/// A change the server could not reconcile, paired with its current copy of
/// the row (empty when the row does not exist).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub client_id: Uuid,
    pub server_id: Option<Uuid>,
    pub client_data: serde_json::Map<String, serde_json::Value>,
    pub server_data: serde_json::Map<String, serde_json::Value>,
    pub conflict_type: ConflictType,
}

/// A change refused because its data does not fit the table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRejection {
    pub client_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPushResponse {
    pub server_version: i64,
    pub accepted: Vec<Uuid>,
    pub conflicts: Vec<SyncConflict>,
    /// Client id to minted server id, for accepted creates.
    pub id_mapping: HashMap<String, String>,
    pub rejected: Vec<SyncRejection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPullRequest {
    pub table: String,
    #[serde(default)]
    pub since_version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPullResponse {
    pub changes: Vec<serde_json::Map<String, serde_json::Value>>,
    pub server_version: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTableStatus {
    pub version: i64,
    pub count: i64,
    #[serde(with = "utc_millis_option")]
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusResponse {
    pub tables: BTreeMap<String, SyncTableStatus>,
}

/// Per-(user, table) version counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub user_id: String,
    pub table_name: String,
    #[serde(with = "utc_millis_option")]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_server_version: i64,
    #[serde(with = "utc_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "utc_millis")]
    pub updated_at: DateTime<Utc>,
}

impl SyncLogEntry {
    /// A fresh zero-version entry.
    pub fn new(user_id: impl Into<String>, table: SyncTable, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            table_name: table.as_str().to_string(),
            last_sync_at: None,
            last_server_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records one completed push batch.
    pub fn bump(&mut self, now: DateTime<Utc>) {
        self.last_server_version += 1;
        self.last_sync_at = Some(now);
        self.updated_at = now;
    }
}
