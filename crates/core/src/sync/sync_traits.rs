//! Seams between the sync service and its collaborators.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::catalog::{CatalogRecord, RemoteEnvelope, RemoteRequest};
use crate::errors::Result;

/// Remote source of catalog records.
///
/// Implementations never fail: every failure is returned as a synthesized
/// envelope whose status names what went wrong.
#[async_trait]
pub trait CatalogRemoteTrait<R: CatalogRecord>: Send + Sync {
    async fn fetch(&self, request: RemoteRequest) -> RemoteEnvelope<R>;
}

/// Local cache for one record kind.
///
/// `filter` selects the cache scope (the category id for products); `None`
/// is the whole collection.
#[async_trait]
pub trait CatalogStoreTrait<R: CatalogRecord>: Send + Sync {
    /// Current records of the scope, in the order they were stored.
    fn load_all(&self, filter: Option<&str>) -> Result<Vec<R>>;

    /// Live view of the scope: yields the current records immediately, then once
    /// more after every committed write.
    fn observe_all(&self, filter: Option<String>) -> BoxStream<'static, Result<Vec<R>>>;

    /// Replaces every record of the scope with `records` as one indivisible write.
    /// Returns the number of records stored.
    async fn replace_all(&self, filter: Option<String>, records: Vec<R>) -> Result<usize>;
}

/// Supplies the current session token.
pub trait SessionProvider: Send + Sync {
    fn current_token(&self) -> Option<String>;
}
