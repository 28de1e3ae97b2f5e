//! Error types shared across the workspace.

use thiserror::Error;

use crate::gateway::GatewayError;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for everything the cache and sync engine can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input rejected before it reaches the store.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Storage-level failures, reported by the SQLite layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The writer actor is gone; no further writes can be accepted.
    #[error("Write queue unavailable: {0}")]
    WriteQueue(String),

    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Error::Unexpected(message.into())
    }
}
