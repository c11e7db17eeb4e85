//! In-memory cache adapter.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use super::CatalogStoreTrait;
use crate::catalog::CatalogRecord;
use crate::errors::{Error, Result};

fn read_scope<R: CatalogRecord>(records: &RwLock<Vec<R>>, filter: Option<&str>) -> Result<Vec<R>> {
    let guard = records
        .read()
        .map_err(|_| Error::cache("In-memory catalog store is poisoned"))?;
    Ok(match filter {
        Some(filter) => guard.iter().filter(|r| r.in_scope(filter)).cloned().collect(),
        None => guard.clone(),
    })
}

/// Cache kept in process memory. Writes take the write lock for the whole
/// delete-then-insert, so readers see either the old scope or the new one.
pub struct InMemoryCatalogStore<R: CatalogRecord> {
    records: Arc<RwLock<Vec<R>>>,
    version: watch::Sender<u64>,
}

impl<R: CatalogRecord> InMemoryCatalogStore<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Store pre-populated with `records`, as if a previous sync had written them.
    pub fn with_records(records: Vec<R>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            records: Arc::new(RwLock::new(records)),
            version,
        }
    }
}

impl<R: CatalogRecord> Default for InMemoryCatalogStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: CatalogRecord> CatalogStoreTrait<R> for InMemoryCatalogStore<R> {
    fn load_all(&self, filter: Option<&str>) -> Result<Vec<R>> {
        read_scope(&self.records, filter)
    }

    fn observe_all(&self, filter: Option<String>) -> BoxStream<'static, Result<Vec<R>>> {
        let records = Arc::clone(&self.records);
        let receiver = self.version.subscribe();

        stream::unfold((receiver, true), move |(mut receiver, first)| {
            let records = Arc::clone(&records);
            let filter = filter.clone();
            async move {
                if !first && receiver.changed().await.is_err() {
                    return None;
                }
                receiver.borrow_and_update();
                let snapshot = read_scope(&records, filter.as_deref());
                Some((snapshot, (receiver, false)))
            }
        })
        .boxed()
    }

    async fn replace_all(&self, filter: Option<String>, records: Vec<R>) -> Result<usize> {
        let count = records.len();
        {
            let mut guard = self
                .records
                .write()
                .map_err(|_| Error::cache("In-memory catalog store is poisoned"))?;
            match filter.as_deref() {
                Some(filter) => guard.retain(|r| !r.in_scope(filter)),
                None => guard.clear(),
            }
            guard.extend(records);
        }
        self.version.send_modify(|v| *v += 1);
        Ok(count)
    }
}
