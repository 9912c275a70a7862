use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use accountant_core::errors::{Error, Result};
use accountant_core::sync::{
    normalize_row, reconcile_push, SyncChange, SyncPullResponse, SyncPushResponse,
    SyncRepositoryTrait, SyncTable, SyncTableStatus,
};

use super::store::{escape_sqlite_str, load_log, quote_identifier, SqliteSyncStore};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;

#[derive(QueryableByName)]
struct RowJson {
    #[diesel(sql_type = Text)]
    row_json: String,
}

#[derive(QueryableByName)]
struct RowCount {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

/// Builds `SELECT json_object(...)` over every catalog column of `table`.
fn snapshot_sql(table: SyncTable, user_id: &str) -> String {
    let pairs = table
        .columns()
        .iter()
        .map(|column| {
            format!(
                "'{}', {}",
                escape_sqlite_str(column.name),
                quote_identifier(column.name)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT json_object({}) AS row_json FROM {} WHERE {} = '{}' ORDER BY {}, {}",
        pairs,
        quote_identifier(table.as_str()),
        quote_identifier("user_id"),
        escape_sqlite_str(user_id),
        quote_identifier("created_at"),
        quote_identifier("id")
    )
}

fn load_snapshot(
    conn: &mut SqliteConnection,
    user_id: &str,
    table: SyncTable,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let rows = diesel::sql_query(snapshot_sql(table, user_id))
        .load::<RowJson>(conn)
        .map_err(StorageError::from)?;
    rows.into_iter()
        .map(|row| {
            let value: serde_json::Value = serde_json::from_str(&row.row_json)?;
            match value {
                serde_json::Value::Object(map) => Ok(normalize_row(table, map)),
                _ => Err(Error::Unexpected(format!(
                    "Snapshot row of '{}' is not a JSON object",
                    table
                ))),
            }
        })
        .collect()
}

fn count_rows(conn: &mut SqliteConnection, user_id: &str, table: SyncTable) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) AS total FROM {} WHERE {} = '{}'",
        quote_identifier(table.as_str()),
        quote_identifier("user_id"),
        escape_sqlite_str(user_id)
    );
    let row = diesel::sql_query(sql)
        .get_result::<RowCount>(conn)
        .map_err(StorageError::from)?;
    Ok(row.total)
}

pub struct SyncRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SyncRepository { pool, writer }
    }
}

#[async_trait]
impl SyncRepositoryTrait for SyncRepository {
    async fn push_changes(
        &self,
        user_id: String,
        table: SyncTable,
        changes: Vec<SyncChange>,
        now: DateTime<Utc>,
    ) -> Result<SyncPushResponse> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncPushResponse> {
                let mut store = SqliteSyncStore::new(conn);
                reconcile_push(&mut store, &user_id, table, &changes, now)
            })
            .await
    }

    fn pull_snapshot(&self, user_id: &str, table: SyncTable) -> Result<SyncPullResponse> {
        let mut conn = get_connection(&self.pool)?;
        let changes = load_snapshot(&mut conn, user_id, table)?;
        let server_version = load_log(&mut conn, user_id, table)?
            .map(|log| log.last_server_version)
            .unwrap_or(0);
        Ok(SyncPullResponse {
            changes,
            server_version,
            has_more: false,
        })
    }

    fn table_status(&self, user_id: &str, table: SyncTable) -> Result<SyncTableStatus> {
        let mut conn = get_connection(&self.pool)?;
        let count = count_rows(&mut conn, user_id, table)?;
        let log = load_log(&mut conn, user_id, table)?;
        Ok(SyncTableStatus {
            version: log.as_ref().map_or(0, |log| log.last_server_version),
            count,
            last_sync: log.and_then(|log| log.last_sync_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accountant_core::sync::{ConflictType, SyncAction};
    use serde_json::{json, Map, Value};
    use uuid::Uuid;

    use crate::test_support::{setup_db, OTHER_USER, USER};

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn change(action: SyncAction, server_id: Option<&str>, value: Value) -> SyncChange {
        SyncChange {
            id: Uuid::new_v4(),
            server_id: server_id.map(|id| Uuid::parse_str(id).unwrap()),
            action,
            data: data(value),
            client_timestamp: Utc::now(),
        }
    }

    async fn push(
        repo: &SyncRepository,
        user_id: &str,
        table: SyncTable,
        changes: Vec<SyncChange>,
    ) -> SyncPushResponse {
        repo.push_changes(user_id.to_string(), table, changes, Utc::now())
            .await
            .unwrap()
    }

    async fn create_wallet(repo: &SyncRepository, name: &str) -> String {
        let create = change(SyncAction::Create, None, json!({ "name": name, "balance": "10.5" }));
        let client_id = create.id.to_string();
        let response = push(repo, USER, SyncTable::Wallets, vec![create]).await;
        response.id_mapping[&client_id].clone()
    }

    #[tokio::test]
    async fn pushed_create_is_visible_in_pull() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);

        let create = change(
            SyncAction::Create,
            None,
            json!({ "name": "Cash", "balance": "10.5", "is_default": true, "sync_status": "pending" }),
        );
        let client_id = create.id;
        let response = push(&repo, USER, SyncTable::Wallets, vec![create]).await;
        assert_eq!(response.accepted, vec![client_id]);
        assert_eq!(response.server_version, 1);
        let server_id = &response.id_mapping[&client_id.to_string()];
        assert_ne!(server_id, &client_id.to_string());

        let pulled = repo.pull_snapshot(USER, SyncTable::Wallets).unwrap();
        assert_eq!(pulled.server_version, 1);
        assert!(!pulled.has_more);
        assert_eq!(pulled.changes.len(), 1);
        let row = &pulled.changes[0];
        assert_eq!(row["id"], json!(server_id));
        assert_eq!(row["user_id"], json!(USER));
        assert_eq!(row["balance"], json!("10.50"));
        assert_eq!(row["is_default"], json!(true));
        assert_eq!(row["currency"], json!("USD"));
        assert_eq!(row["deleted_at"], Value::Null);
        assert!(!row.contains_key("sync_status"));

        assert!(repo.pull_snapshot(OTHER_USER, SyncTable::Wallets).unwrap().changes.is_empty());
    }

    #[tokio::test]
    async fn version_counts_batches_not_changes() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);

        let batch = (0..5)
            .map(|i| change(SyncAction::Create, None, json!({ "name": format!("Category {i}") })))
            .collect();
        let response = push(&repo, USER, SyncTable::Categories, batch).await;
        assert_eq!(response.accepted.len(), 5);
        assert_eq!(response.server_version, 1);

        let response = push(&repo, USER, SyncTable::Categories, Vec::new()).await;
        assert_eq!(response.server_version, 2);

        let status = repo.table_status(USER, SyncTable::Categories).unwrap();
        assert_eq!(status.version, 2);
        assert_eq!(status.count, 5);
        assert!(status.last_sync.is_some());

        let untouched = repo.table_status(USER, SyncTable::Budgets).unwrap();
        assert_eq!(untouched, SyncTableStatus { version: 0, count: 0, last_sync: None });
        assert_eq!(repo.pull_snapshot(USER, SyncTable::Budgets).unwrap().server_version, 0);
    }

    #[tokio::test]
    async fn update_overwrites_and_missing_row_conflicts() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);
        let wallet_id = create_wallet(&repo, "Cash").await;

        let update = change(SyncAction::Update, Some(&wallet_id), json!({ "name": "Savings" }));
        let missing_id = Uuid::new_v4().to_string();
        let orphan = change(SyncAction::Update, Some(&missing_id), json!({ "name": "Ghost" }));
        let orphan_id = orphan.id;
        let response = push(&repo, USER, SyncTable::Wallets, vec![update, orphan]).await;
        assert_eq!(response.accepted.len(), 1);
        assert_eq!(response.conflicts.len(), 1);
        assert_eq!(response.conflicts[0].client_id, orphan_id);
        assert_eq!(response.conflicts[0].conflict_type, ConflictType::DeleteConflict);

        let pulled = repo.pull_snapshot(USER, SyncTable::Wallets).unwrap();
        assert_eq!(pulled.changes[0]["name"], json!("Savings"));
        assert_eq!(pulled.changes[0]["balance"], json!("10.50"));

        let foreign = change(SyncAction::Update, Some(&wallet_id), json!({ "name": "Stolen" }));
        let response = push(&repo, OTHER_USER, SyncTable::Wallets, vec![foreign]).await;
        assert_eq!(response.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_soft_where_supported() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);
        let wallet_id = create_wallet(&repo, "Cash").await;

        let delete = change(SyncAction::Delete, Some(&wallet_id), json!({}));
        let response = push(&repo, USER, SyncTable::Wallets, vec![delete]).await;
        assert_eq!(response.accepted.len(), 1);

        let pulled = repo.pull_snapshot(USER, SyncTable::Wallets).unwrap();
        assert_eq!(pulled.changes.len(), 1);
        assert!(pulled.changes[0]["deleted_at"].is_string());
        assert_eq!(repo.table_status(USER, SyncTable::Wallets).unwrap().count, 1);

        let missing = change(SyncAction::Delete, Some(&Uuid::new_v4().to_string()), json!({}));
        let response = push(&repo, USER, SyncTable::Wallets, vec![missing]).await;
        assert!(response.accepted.is_empty());
        assert!(response.conflicts.is_empty());
    }

    #[tokio::test]
    async fn recurring_configs_are_hard_deleted() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);
        let wallet_id = create_wallet(&repo, "Cash").await;

        let base = change(
            SyncAction::Create,
            None,
            json!({
                "wallet_id": wallet_id,
                "amount": 25,
                "title": "Gym",
                "date": "2024-01-01T00:00:00Z"
            }),
        );
        let base_client_id = base.id.to_string();
        let response = push(&repo, USER, SyncTable::Transactions, vec![base]).await;
        let base_id = response.id_mapping[&base_client_id].clone();

        let config = change(
            SyncAction::Create,
            None,
            json!({ "base_transaction_id": base_id, "start_date": "2024-01-15", "reoccurrence": "weekly" }),
        );
        let config_client_id = config.id.to_string();
        let response = push(&repo, USER, SyncTable::RecurringConfigs, vec![config]).await;
        let config_id = response.id_mapping[&config_client_id].clone();

        let pulled = repo.pull_snapshot(USER, SyncTable::RecurringConfigs).unwrap();
        assert_eq!(pulled.changes[0]["next_occurrence"], json!("2024-01-15"));
        assert_eq!(pulled.changes[0]["is_active"], json!(true));

        let delete = change(SyncAction::Delete, Some(&config_id), json!({}));
        let response = push(&repo, USER, SyncTable::RecurringConfigs, vec![delete]).await;
        assert_eq!(response.accepted.len(), 1);
        assert!(repo
            .pull_snapshot(USER, SyncTable::RecurringConfigs)
            .unwrap()
            .changes
            .is_empty());
    }

    #[tokio::test]
    async fn invalid_and_failing_changes_do_not_block_siblings() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);

        let unknown = change(SyncAction::Create, None, json!({ "name": "Food", "password": "x" }));
        let unknown_id = unknown.id;
        let category = change(SyncAction::Create, None, json!({ "name": "Drinks" }));
        let category_client_id = category.id.to_string();
        let response = push(&repo, USER, SyncTable::Categories, vec![unknown, category]).await;
        assert_eq!(response.rejected.len(), 1);
        assert_eq!(response.rejected[0].client_id, unknown_id);
        assert_eq!(response.accepted.len(), 1);
        let category_id = response.id_mapping[&category_client_id].clone();

        let dangling = change(
            SyncAction::Create,
            None,
            json!({ "title": "Coffee", "category_id": Uuid::new_v4() }),
        );
        let valid = change(
            SyncAction::Create,
            None,
            json!({ "title": "Tea's", "category_id": category_id }),
        );
        let valid_id = valid.id;
        let response = push(&repo, USER, SyncTable::AssociatedTitles, vec![dangling, valid]).await;
        assert_eq!(response.accepted, vec![valid_id]);
        assert!(response.rejected.is_empty());
        assert_eq!(response.server_version, 1);

        let pulled = repo.pull_snapshot(USER, SyncTable::AssociatedTitles).unwrap();
        assert_eq!(pulled.changes.len(), 1);
        assert_eq!(pulled.changes[0]["title"], json!("Tea's"));
    }

    #[tokio::test]
    async fn budget_arrays_round_trip_as_json() {
        let (pool, writer) = setup_db();
        let repo = SyncRepository::new(pool, writer);
        let create = change(
            SyncAction::Create,
            None,
            json!({
                "name": "Groceries",
                "amount": "300",
                "start_date": "2024-01-01",
                "wallet_ids": ["a", "b"]
            }),
        );
        push(&repo, USER, SyncTable::Budgets, vec![create]).await;

        let pulled = repo.pull_snapshot(USER, SyncTable::Budgets).unwrap();
        let row = &pulled.changes[0];
        assert_eq!(row["wallet_ids"], json!(["a", "b"]));
        assert_eq!(row["category_ids"], Value::Null);
        assert_eq!(row["amount"], json!("300.00"));
        assert_eq!(row["period"], json!("monthly"));
    }
}
