//! Storage-level error type and its mapping onto the shared error enum.

use spendlog_core::errors::{DatabaseError, Error};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Write queue unavailable: {0}")]
    WriteQueue(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value no longer parses back into its domain type.
    #[error("Stored value corrupt: {0}")]
    Corrupt(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::Pool(e) => Error::Database(DatabaseError::Pool(e.to_string())),
            StorageError::Migration(message) => {
                Error::Database(DatabaseError::MigrationFailed(message))
            }
            StorageError::WriteQueue(message) => {
                Error::Database(DatabaseError::WriteQueue(message))
            }
            StorageError::Io(e) => Error::Database(DatabaseError::Internal(e.to_string())),
            StorageError::Corrupt(message) => Error::Database(DatabaseError::Internal(message)),
        }
    }
}
