use catalog_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Storage-layer failures. Converted into the core `Error` at the repository
/// boundary so the sync service never sees diesel types.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Writer unavailable: {0}")]
    Writer(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        let database = match err {
            StorageError::Query(e) => DatabaseError::QueryFailed(e.to_string()),
            StorageError::Pool(e) => DatabaseError::PoolCreationFailed(e.to_string()),
            StorageError::Connection(e) => DatabaseError::ConnectionFailed(e.to_string()),
            StorageError::Migration(message) => DatabaseError::MigrationFailed(message),
            StorageError::Writer(message) => DatabaseError::Internal(message),
        };
        Error::Database(database)
    }
}
