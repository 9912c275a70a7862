//! Storage-layer errors and their mapping onto the core taxonomy.

use accountant_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A stored value could not be parsed back into its domain type.
    #[error("Corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },

    /// A domain error raised inside a write job.
    #[error(transparent)]
    Domain(#[from] Error),
}

impl StorageError {
    pub fn corrupt(column: &'static str, value: impl Into<String>) -> Self {
        Self::Corrupt {
            column,
            value: value.into(),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(diesel::result::Error::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::Query(err) => Error::Database(DatabaseError::QueryFailed(err.to_string())),
            StorageError::Connection(err) => {
                Error::Database(DatabaseError::ConnectionFailed(err.to_string()))
            }
            StorageError::Pool(err) => {
                Error::Database(DatabaseError::PoolCreationFailed(err.to_string()))
            }
            StorageError::Migration(message) => {
                Error::Database(DatabaseError::MigrationFailed(message))
            }
            err @ StorageError::Corrupt { .. } => {
                Error::Database(DatabaseError::Internal(err.to_string()))
            }
            StorageError::Domain(err) => err,
        }
    }
}
