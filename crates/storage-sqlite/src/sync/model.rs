use diesel::prelude::*;

use accountant_core::sync::SyncLogEntry;
use accountant_core::utils::time_utils::format_utc_millis;

use crate::errors::StorageError;
use crate::transactions::{optional_timestamp_from_db, timestamp_from_db};

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::sync_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SyncLogDB {
    pub id: String,
    pub user_id: String,
    pub table_name: String,
    pub last_sync_at: Option<String>,
    pub last_server_version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SyncLogDB> for SyncLogEntry {
    type Error = StorageError;

    fn try_from(db: SyncLogDB) -> Result<Self, Self::Error> {
        Ok(SyncLogEntry {
            last_sync_at: optional_timestamp_from_db("last_sync_at", db.last_sync_at.as_deref())?,
            created_at: timestamp_from_db("created_at", &db.created_at)?,
            updated_at: timestamp_from_db("updated_at", &db.updated_at)?,
            id: db.id,
            user_id: db.user_id,
            table_name: db.table_name,
            last_server_version: db.last_server_version,
        })
    }
}

impl From<&SyncLogEntry> for SyncLogDB {
    fn from(entry: &SyncLogEntry) -> Self {
        SyncLogDB {
            id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            table_name: entry.table_name.clone(),
            last_sync_at: entry.last_sync_at.as_ref().map(format_utc_millis),
            last_server_version: entry.last_server_version,
            created_at: format_utc_millis(&entry.created_at),
            updated_at: format_utc_millis(&entry.updated_at),
        }
    }
}
