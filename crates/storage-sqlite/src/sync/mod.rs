//! SQLite side of client sync: the row store behind push reconciliation,
//! pull snapshots and sync log bookkeeping.

mod model;
mod repository;
mod store;

pub use model::SyncLogDB;
pub use repository::SyncRepository;
pub use store::{escape_sqlite_str, field_value_to_sql_literal, quote_identifier, SqliteSyncStore};
