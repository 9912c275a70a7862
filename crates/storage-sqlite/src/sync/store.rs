//! `SyncStore` over an open SQLite write transaction.
//!
//! Table and column names come from the static field catalog, never from the
//! request, and every value is rendered as an escaped literal.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use accountant_core::errors::Result;
use accountant_core::sync::{FieldValue, SyncLogEntry, SyncStore, SyncTable};
use accountant_core::utils::time_utils::{format_date, format_utc_millis};

use super::model::SyncLogDB;
use crate::db::{with_savepoint, SavepointScope};
use crate::errors::StorageError;
use crate::schema::sync_logs;

pub fn escape_sqlite_str(value: &str) -> String {
    value.replace('\'', "''")
}

pub fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

fn text_literal(value: &str) -> String {
    format!("'{}'", escape_sqlite_str(value))
}

pub fn field_value_to_sql_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Text(text) => text_literal(text),
        FieldValue::Bool(flag) => {
            if *flag {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        FieldValue::Integer(number) => number.to_string(),
        FieldValue::Decimal(amount) => text_literal(&amount.to_string()),
        FieldValue::Date(date) => text_literal(&format_date(date)),
        FieldValue::Timestamp(ts) => text_literal(&format_utc_millis(ts)),
        FieldValue::Json(json) => text_literal(&json.to_string()),
    }
}

fn owner_clause(user_id: &str, id: &str) -> String {
    format!(
        "{} = {} AND {} = {}",
        quote_identifier("id"),
        text_literal(id),
        quote_identifier("user_id"),
        text_literal(user_id)
    )
}

pub struct SqliteSyncStore<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> SqliteSyncStore<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        Self { conn }
    }

    fn execute(&mut self, sql: String) -> Result<usize> {
        Ok(diesel::sql_query(sql)
            .execute(self.conn)
            .map_err(StorageError::from)?)
    }
}

impl SyncStore for SqliteSyncStore<'_> {
    fn insert_row(
        &mut self,
        table: SyncTable,
        user_id: &str,
        id: &str,
        fields: &[(&'static str, FieldValue)],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now = FieldValue::Timestamp(now);
        let id = FieldValue::Text(id.to_string());
        let owner = FieldValue::Text(user_id.to_string());
        let assignments = [("id", &id), ("user_id", &owner)]
            .into_iter()
            .chain(fields.iter().map(|(name, value)| (*name, value)))
            .chain([("created_at", &now), ("updated_at", &now)])
            .collect::<Vec<_>>();

        let columns = assignments
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let values = assignments
            .iter()
            .map(|(_, value)| field_value_to_sql_literal(value))
            .collect::<Vec<_>>()
            .join(", ");
        self.execute(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table.as_str()),
            columns,
            values
        ))?;
        Ok(())
    }

    fn update_row(
        &mut self,
        table: SyncTable,
        user_id: &str,
        id: &str,
        fields: &[(&'static str, FieldValue)],
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut assignments = fields
            .iter()
            .map(|(name, value)| {
                format!("{} = {}", quote_identifier(name), field_value_to_sql_literal(value))
            })
            .collect::<Vec<_>>();
        assignments.push(format!(
            "{} = {}",
            quote_identifier("updated_at"),
            text_literal(&format_utc_millis(&now))
        ));
        let updated = self.execute(format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(table.as_str()),
            assignments.join(", "),
            owner_clause(user_id, id)
        ))?;
        Ok(updated > 0)
    }

    fn soft_delete_row(
        &mut self,
        table: SyncTable,
        user_id: &str,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now = text_literal(&format_utc_millis(&now));
        let updated = self.execute(format!(
            "UPDATE {table} SET {deleted} = COALESCE({deleted}, {now}), {updated} = {now} WHERE {owner}",
            table = quote_identifier(table.as_str()),
            deleted = quote_identifier("deleted_at"),
            updated = quote_identifier("updated_at"),
            now = now,
            owner = owner_clause(user_id, id)
        ))?;
        Ok(updated > 0)
    }

    fn hard_delete_row(&mut self, table: SyncTable, user_id: &str, id: &str) -> Result<bool> {
        let deleted = self.execute(format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(table.as_str()),
            owner_clause(user_id, id)
        ))?;
        Ok(deleted > 0)
    }

    fn load_log(&mut self, user_id: &str, table: SyncTable) -> Result<Option<SyncLogEntry>> {
        load_log(self.conn, user_id, table)
    }

    fn save_log(&mut self, entry: &SyncLogEntry) -> Result<()> {
        let row = SyncLogDB::from(entry);
        diesel::insert_into(sync_logs::table)
            .values(&row)
            .on_conflict((sync_logs::user_id, sync_logs::table_name))
            .do_update()
            .set((
                sync_logs::last_sync_at.eq(row.last_sync_at.clone()),
                sync_logs::last_server_version.eq(row.last_server_version),
                sync_logs::updated_at.eq(row.updated_at.clone()),
            ))
            .execute(self.conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn isolated<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        with_savepoint(self, f)
    }
}

impl SavepointScope for SqliteSyncStore<'_> {
    fn connection(&mut self) -> &mut SqliteConnection {
        self.conn
    }
}

pub(crate) fn load_log(
    conn: &mut SqliteConnection,
    user_id: &str,
    table: SyncTable,
) -> Result<Option<SyncLogEntry>> {
    sync_logs::table
        .filter(sync_logs::user_id.eq(user_id))
        .filter(sync_logs::table_name.eq(table.as_str()))
        .select(SyncLogDB::as_select())
        .first::<SyncLogDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .map(|row| SyncLogEntry::try_from(row).map_err(Into::into))
        .transpose()
}
