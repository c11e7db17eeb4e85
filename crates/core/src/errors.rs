//! Error types shared by the catalog crates.

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for cache and wiring failures.
///
/// Network and decode failures never show up here: those are carried as
/// synthesized envelopes and `SyncResult::Error` values instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cache store error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl Error {
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_message_is_wrapped() {
        let err: Error = DatabaseError::QueryFailed("no such table".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Database operation failed: Query failed: no such table"
        );
    }
}
