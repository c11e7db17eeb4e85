//! Catalog synchronization core: record models, the sync error taxonomy, the
//! seams the sync service depends on, and the cache-first sync service itself.

pub mod catalog;
pub mod errors;
pub mod sync;

pub use errors::{Error, Result};
