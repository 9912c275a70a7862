//! Push reconciliation over an abstract row store.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use uuid::Uuid;

use super::field_catalog::{prepare_fields, FieldValue, PrepareMode};
use super::{
    ConflictType, SyncAction, SyncChange, SyncConflict, SyncLogEntry, SyncPushResponse,
    SyncRejection, SyncTable,
};
use crate::errors::{Error, Result};

/// Row operations the reconciler needs from storage. Every method is scoped
/// to one owner; a row belonging to another user is indistinguishable from a
/// missing one.
pub trait SyncStore {
    fn insert_row(
        &mut self,
        table: SyncTable,
        user_id: &str,
        id: &str,
        fields: &[(&'static str, FieldValue)],
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Overwrites the given columns and `updated_at`. Returns false when no
    /// row matched.
    fn update_row(
        &mut self,
        table: SyncTable,
        user_id: &str,
        id: &str,
        fields: &[(&'static str, FieldValue)],
        now: DateTime<Utc>,
    ) -> Result<bool>;

    fn soft_delete_row(
        &mut self,
        table: SyncTable,
        user_id: &str,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    fn hard_delete_row(&mut self, table: SyncTable, user_id: &str, id: &str) -> Result<bool>;

    fn load_log(&mut self, user_id: &str, table: SyncTable) -> Result<Option<SyncLogEntry>>;

    fn save_log(&mut self, entry: &SyncLogEntry) -> Result<()>;

    /// Runs `f` so that an error undoes only what `f` wrote.
    fn isolated<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>;
}

enum Outcome {
    Created(String),
    Accepted,
    Conflict(SyncConflict),
    Skipped,
}

fn apply_change<S: SyncStore>(
    store: &mut S,
    table: SyncTable,
    user_id: &str,
    change: &SyncChange,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    match change.action {
        SyncAction::Create => {
            let fields = prepare_fields(table, &change.data, PrepareMode::Create)?;
            let server_id = Uuid::new_v4().to_string();
            store.insert_row(table, user_id, &server_id, &fields, now)?;
            Ok(Outcome::Created(server_id))
        }
        SyncAction::Update => {
            let fields = prepare_fields(table, &change.data, PrepareMode::Update)?;
            let updated = match change.server_id {
                Some(server_id) => {
                    store.update_row(table, user_id, &server_id.to_string(), &fields, now)?
                }
                None => false,
            };
            if updated {
                return Ok(Outcome::Accepted);
            }
            Ok(Outcome::Conflict(SyncConflict {
                client_id: change.id,
                server_id: change.server_id,
                client_data: change.data.clone(),
                server_data: Default::default(),
                conflict_type: ConflictType::DeleteConflict,
            }))
        }
        SyncAction::Delete => {
            let Some(server_id) = change.server_id.map(|id| id.to_string()) else {
                return Ok(Outcome::Skipped);
            };
            let deleted = if table.supports_soft_delete() {
                store.soft_delete_row(table, user_id, &server_id, now)?
            } else {
                store.hard_delete_row(table, user_id, &server_id)?
            };
            Ok(if deleted {
                Outcome::Accepted
            } else {
                Outcome::Skipped
            })
        }
    }
}

/// Applies a batch of client changes to `table` in submission order.
///
/// Each change runs in isolation: a change that fails validation is listed
/// in `rejected`, one that fails in storage is logged and dropped, and
/// neither affects its siblings. An update whose target row does not exist
/// becomes a `delete_conflict`; a delete of a missing row is a silent no-op.
/// Updates overwrite unconditionally (last write wins, no timestamp check).
///
/// The table's sync log is bumped exactly once per call, however many
/// changes the batch holds.
pub fn reconcile_push<S: SyncStore>(
    store: &mut S,
    user_id: &str,
    table: SyncTable,
    changes: &[SyncChange],
    now: DateTime<Utc>,
) -> Result<SyncPushResponse> {
    let mut log = match store.load_log(user_id, table)? {
        Some(log) => log,
        None => SyncLogEntry::new(user_id, table, now),
    };

    let mut response = SyncPushResponse::default();
    for change in changes {
        match store.isolated(|store| apply_change(store, table, user_id, change, now)) {
            Ok(Outcome::Created(server_id)) => {
                response.accepted.push(change.id);
                response.id_mapping.insert(change.id.to_string(), server_id);
            }
            Ok(Outcome::Accepted) => response.accepted.push(change.id),
            Ok(Outcome::Conflict(conflict)) => {
                debug!(
                    "Sync {} change {} for user {} has no server row",
                    table, change.id, user_id
                );
                response.conflicts.push(conflict);
            }
            Ok(Outcome::Skipped) => {}
            Err(Error::Validation(err)) => {
                warn!(
                    "Rejected sync {} change {} for user {}: {}",
                    table, change.id, user_id, err
                );
                response.rejected.push(SyncRejection {
                    client_id: change.id,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                warn!(
                    "Error processing sync {} change {} for user {}: {}",
                    table, change.id, user_id, err
                );
            }
        }
    }

    log.bump(now);
    store.save_log(&log)?;
    response.server_version = log.last_server_version;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseError;
    use serde_json::{json, Map, Value};
    use std::collections::HashMap;

    #[derive(Clone, Default)]
    struct MemoryStore {
        rows: HashMap<(SyncTable, String), (String, Map<String, Value>)>,
        logs: HashMap<(String, SyncTable), SyncLogEntry>,
        fail_on_name: Option<String>,
    }

    impl MemoryStore {
        fn owned_row(&mut self, table: SyncTable, user_id: &str, id: &str) -> Option<&mut Map<String, Value>> {
            self.rows
                .get_mut(&(table, id.to_string()))
                .filter(|(owner, _)| owner == user_id)
                .map(|(_, row)| row)
        }
    }

    impl SyncStore for MemoryStore {
        fn insert_row(
            &mut self,
            table: SyncTable,
            user_id: &str,
            id: &str,
            fields: &[(&'static str, FieldValue)],
            _now: DateTime<Utc>,
        ) -> Result<()> {
            let mut row: Map<String, Value> = fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect();
            row.insert("id".into(), json!(id));
            self.rows
                .insert((table, id.to_string()), (user_id.to_string(), row));
            if let Some(name) = &self.fail_on_name {
                if fields.contains(&("name", FieldValue::Text(name.clone()))) {
                    return Err(DatabaseError::QueryFailed("constraint failed".into()).into());
                }
            }
            Ok(())
        }

        fn update_row(
            &mut self,
            table: SyncTable,
            user_id: &str,
            id: &str,
            fields: &[(&'static str, FieldValue)],
            _now: DateTime<Utc>,
        ) -> Result<bool> {
            let Some(row) = self.owned_row(table, user_id, id) else {
                return Ok(false);
            };
            for (name, value) in fields {
                row.insert(name.to_string(), value.to_json());
            }
            Ok(true)
        }

        fn soft_delete_row(
            &mut self,
            table: SyncTable,
            user_id: &str,
            id: &str,
            now: DateTime<Utc>,
        ) -> Result<bool> {
            let Some(row) = self.owned_row(table, user_id, id) else {
                return Ok(false);
            };
            row.insert("deleted_at".into(), json!(now.to_rfc3339()));
            Ok(true)
        }

        fn hard_delete_row(&mut self, table: SyncTable, user_id: &str, id: &str) -> Result<bool> {
            if self.owned_row(table, user_id, id).is_none() {
                return Ok(false);
            }
            Ok(self.rows.remove(&(table, id.to_string())).is_some())
        }

        fn load_log(&mut self, user_id: &str, table: SyncTable) -> Result<Option<SyncLogEntry>> {
            Ok(self.logs.get(&(user_id.to_string(), table)).cloned())
        }

        fn save_log(&mut self, entry: &SyncLogEntry) -> Result<()> {
            let table = entry.table_name.parse::<SyncTable>()?;
            self.logs
                .insert((entry.user_id.clone(), table), entry.clone());
            Ok(())
        }

        fn isolated<T, F>(&mut self, f: F) -> Result<T>
        where
            F: FnOnce(&mut Self) -> Result<T>,
        {
            let snapshot = self.clone();
            let result = f(self);
            if result.is_err() {
                *self = snapshot;
            }
            result
        }
    }

    const USER: &str = "user-a";

    fn change(action: SyncAction, server_id: Option<Uuid>, data: Value) -> SyncChange {
        SyncChange {
            id: Uuid::new_v4(),
            server_id,
            action,
            data: data.as_object().cloned().unwrap_or_default(),
            client_timestamp: Utc::now(),
        }
    }

    fn push(store: &mut MemoryStore, table: SyncTable, changes: &[SyncChange]) -> SyncPushResponse {
        reconcile_push(store, USER, table, changes, Utc::now()).unwrap()
    }

    fn create_wallet(store: &mut MemoryStore, name: &str) -> Uuid {
        let create = change(SyncAction::Create, None, json!({"name": name}));
        let response = push(store, SyncTable::Wallets, &[create.clone()]);
        response.id_mapping[&create.id.to_string()].parse().unwrap()
    }

    #[test]
    fn create_mints_server_id_and_maps_client_id() {
        let mut store = MemoryStore::default();
        let create = change(
            SyncAction::Create,
            None,
            json!({"name": "Cash", "sync_status": "pending_create", "local_id": 3}),
        );

        let response = push(&mut store, SyncTable::Wallets, &[create.clone()]);

        assert_eq!(response.accepted, vec![create.id]);
        let server_id = &response.id_mapping[&create.id.to_string()];
        assert_ne!(server_id, &create.id.to_string());
        let (owner, row) = &store.rows[&(SyncTable::Wallets, server_id.clone())];
        assert_eq!(owner, USER);
        assert!(!row.contains_key("sync_status"));
        assert!(!row.contains_key("local_id"));
    }

    #[test]
    fn duplicate_create_yields_distinct_server_ids() {
        let mut store = MemoryStore::default();
        let create = change(SyncAction::Create, None, json!({"name": "Cash"}));

        let first = push(&mut store, SyncTable::Wallets, &[create.clone()]);
        let second = push(&mut store, SyncTable::Wallets, &[create.clone()]);

        let key = create.id.to_string();
        assert_ne!(first.id_mapping[&key], second.id_mapping[&key]);
        assert_eq!(store.rows.len(), 2);
    }

    #[test]
    fn update_of_missing_row_is_a_single_delete_conflict() {
        let mut store = MemoryStore::default();
        let missing = Uuid::new_v4();
        let update = change(SyncAction::Update, Some(missing), json!({"name": "Renamed"}));

        let response = push(&mut store, SyncTable::Wallets, &[update.clone()]);

        assert!(response.accepted.is_empty());
        assert_eq!(response.conflicts.len(), 1);
        let conflict = &response.conflicts[0];
        assert_eq!(conflict.conflict_type, ConflictType::DeleteConflict);
        assert_eq!(conflict.client_id, update.id);
        assert_eq!(conflict.server_id, Some(missing));
        assert!(conflict.server_data.is_empty());
        assert_eq!(conflict.client_data, update.data);
    }

    #[test]
    fn update_overwrites_unconditionally() {
        let mut store = MemoryStore::default();
        let server_id = create_wallet(&mut store, "Cash");

        let mut stale = change(SyncAction::Update, Some(server_id), json!({"name": "Old name"}));
        stale.client_timestamp = Utc::now() - chrono::Duration::days(30);
        let response = push(&mut store, SyncTable::Wallets, &[stale.clone()]);

        assert_eq!(response.accepted, vec![stale.id]);
        let row = &store.rows[&(SyncTable::Wallets, server_id.to_string())].1;
        assert_eq!(row["name"], json!("Old name"));
    }

    #[test]
    fn rows_of_other_users_are_invisible() {
        let mut store = MemoryStore::default();
        let server_id = create_wallet(&mut store, "Cash");

        let update = change(SyncAction::Update, Some(server_id), json!({"name": "Mine now"}));
        let response =
            reconcile_push(&mut store, "user-b", SyncTable::Wallets, &[update], Utc::now()).unwrap();

        assert_eq!(response.conflicts.len(), 1);
        let row = &store.rows[&(SyncTable::Wallets, server_id.to_string())].1;
        assert_eq!(row["name"], json!("Cash"));
    }

    #[test]
    fn delete_soft_deletes_or_hard_deletes_by_table() {
        let mut store = MemoryStore::default();
        let wallet_id = create_wallet(&mut store, "Cash");
        let delete = change(SyncAction::Delete, Some(wallet_id), json!({}));
        let response = push(&mut store, SyncTable::Wallets, &[delete.clone()]);
        assert_eq!(response.accepted, vec![delete.id]);
        assert!(store.rows[&(SyncTable::Wallets, wallet_id.to_string())]
            .1
            .contains_key("deleted_at"));

        let title = change(
            SyncAction::Create,
            None,
            json!({"title": "Coffee Shop", "category_id": Uuid::new_v4().to_string()}),
        );
        let created = push(&mut store, SyncTable::AssociatedTitles, &[title.clone()]);
        let title_id: Uuid = created.id_mapping[&title.id.to_string()].parse().unwrap();
        let delete = change(SyncAction::Delete, Some(title_id), json!({}));
        push(&mut store, SyncTable::AssociatedTitles, &[delete]);
        assert!(!store
            .rows
            .contains_key(&(SyncTable::AssociatedTitles, title_id.to_string())));
    }

    #[test]
    fn delete_of_missing_row_is_silent() {
        let mut store = MemoryStore::default();
        let delete = change(SyncAction::Delete, Some(Uuid::new_v4()), json!({}));

        let response = push(&mut store, SyncTable::Budgets, &[delete]);

        assert!(response.accepted.is_empty());
        assert!(response.conflicts.is_empty());
        assert!(response.rejected.is_empty());
    }

    #[test]
    fn version_moves_by_one_per_batch_regardless_of_size() {
        let mut store = MemoryStore::default();
        let one = push(
            &mut store,
            SyncTable::Categories,
            &[change(SyncAction::Create, None, json!({"name": "Food"}))],
        );
        assert_eq!(one.server_version, 1);

        let fifty: Vec<_> = (0..50)
            .map(|i| change(SyncAction::Create, None, json!({"name": format!("Cat {i}")})))
            .collect();
        let batch = push(&mut store, SyncTable::Categories, &fifty);
        assert_eq!(batch.server_version, 2);
        assert_eq!(batch.accepted.len(), 50);

        let other_table = push(&mut store, SyncTable::Wallets, &[]);
        assert_eq!(other_table.server_version, 1);
    }

    #[test]
    fn schedule_outside_its_window_is_rejected() {
        let mut store = MemoryStore::default();
        let backwards = change(
            SyncAction::Create,
            None,
            json!({
                "base_transaction_id": Uuid::new_v4().to_string(),
                "start_date": "2024-06-01",
                "next_occurrence": "2024-01-01",
                "end_date": "2023-01-01",
            }),
        );
        let valid = change(
            SyncAction::Create,
            None,
            json!({
                "base_transaction_id": Uuid::new_v4().to_string(),
                "start_date": "2024-06-01",
            }),
        );

        let response = push(
            &mut store,
            SyncTable::RecurringConfigs,
            &[backwards.clone(), valid.clone()],
        );

        assert_eq!(response.accepted, vec![valid.id]);
        assert_eq!(response.rejected.len(), 1);
        assert_eq!(response.rejected[0].client_id, backwards.id);
        assert!(!response.id_mapping.contains_key(&backwards.id.to_string()));
        assert_eq!(store.rows.len(), 1);
    }

    #[test]
    fn failing_change_does_not_abort_batch() {
        let mut store = MemoryStore {
            fail_on_name: Some("Broken".into()),
            ..Default::default()
        };
        let good = change(SyncAction::Create, None, json!({"name": "Cash"}));
        let broken = change(SyncAction::Create, None, json!({"name": "Broken"}));
        let invalid = change(SyncAction::Create, None, json!({"name": "Bank", "colour": "red"}));
        let later = change(SyncAction::Create, None, json!({"name": "Savings"}));

        let response = push(
            &mut store,
            SyncTable::Wallets,
            &[good.clone(), broken.clone(), invalid.clone(), later.clone()],
        );

        assert_eq!(response.accepted, vec![good.id, later.id]);
        assert_eq!(response.rejected.len(), 1);
        assert_eq!(response.rejected[0].client_id, invalid.id);
        assert!(response.rejected[0].reason.contains("colour"));
        assert!(!response.id_mapping.contains_key(&broken.id.to_string()));
        assert_eq!(store.rows.len(), 2);
        assert_eq!(response.server_version, 1);
    }
}
