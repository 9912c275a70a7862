//! Connection pool, migrations and the serialized writer.

pub mod write_actor;

use diesel::connection::{AnsiTransactionManager, SimpleConnection, TransactionManager};
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use accountant_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

pub use write_actor::{spawn_writer, WriteHandle};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub const DB_FILE_NAME: &str = "accountant.db";

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// Ensures `data_dir` exists and returns the database file path inside it.
pub fn init(data_dir: &str) -> Result<String> {
    std::fs::create_dir_all(data_dir).map_err(|err| {
        Error::Database(DatabaseError::ConnectionFailed(format!(
            "Cannot create data directory '{}': {}",
            data_dir, err
        )))
    })?;
    let db_path = Path::new(data_dir).join(DB_FILE_NAME);
    Ok(db_path.to_string_lossy().to_string())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(8)
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(|err| Error::Database(DatabaseError::PoolCreationFailed(err.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get()
        .map_err(|err| Error::Database(DatabaseError::ConnectionFailed(err.to_string())))
}

pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| StorageError::Migration(err.to_string()))?;
    if !applied.is_empty() {
        info!("Applied {} database migrations", applied.len());
    }
    Ok(())
}

/// Anything that can lend the write connection to a savepoint.
pub trait SavepointScope {
    fn connection(&mut self) -> &mut SqliteConnection;
}

impl SavepointScope for SqliteConnection {
    fn connection(&mut self) -> &mut SqliteConnection {
        self
    }
}

/// Runs `f` inside a savepoint of the current transaction; an error rolls
/// back only what `f` wrote.
pub fn with_savepoint<S, T, F>(scope: &mut S, f: F) -> Result<T>
where
    S: SavepointScope + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    AnsiTransactionManager::begin_transaction(scope.connection()).map_err(StorageError::from)?;
    match f(scope) {
        Ok(value) => {
            AnsiTransactionManager::commit_transaction(scope.connection())
                .map_err(StorageError::from)?;
            Ok(value)
        }
        Err(err) => {
            AnsiTransactionManager::rollback_transaction(scope.connection())
                .map_err(StorageError::from)?;
            Err(err)
        }
    }
}
