//! SQLite cache for catalog records (diesel + r2d2, single writer thread).

pub mod catalog;
pub mod db;
pub mod errors;
pub mod schema;

pub use catalog::{CacheTable, CatalogCacheRepository, SqliteCatalogStorage};
pub use db::{get_connection, init, spawn_writer, DbPool, WriteHandle};
pub use errors::StorageError;
