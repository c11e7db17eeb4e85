use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use diesel::sqlite::SqliteConnection;
use futures::stream::{self, BoxStream, StreamExt};
use log::debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

use catalog_core::catalog::{Category, Product, Profile};
use catalog_core::errors::Result;
use catalog_core::sync::{CatalogStoreTrait, CatalogStores};

use super::tables::CacheTable;
use crate::db::{self, get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;

fn load_scope<R: CacheTable>(pool: &DbPool, filter: Option<&str>) -> Result<Vec<R>> {
    let mut pooled = get_connection(pool)?;
    let conn: &mut SqliteConnection = &mut pooled;
    Ok(R::load(conn, filter).map_err(StorageError::from)?)
}

/// SQLite-backed cache for one record kind.
///
/// Writes go through the shared writer; observers are woken after the write
/// transaction has committed.
pub struct CatalogCacheRepository<R: CacheTable> {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    version: Arc<watch::Sender<u64>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: CacheTable> CatalogCacheRepository<R> {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        let (version, _) = watch::channel(0);
        CatalogCacheRepository {
            pool,
            writer,
            version: Arc::new(version),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: CacheTable> CatalogStoreTrait<R> for CatalogCacheRepository<R> {
    fn load_all(&self, filter: Option<&str>) -> Result<Vec<R>> {
        load_scope(&self.pool, filter)
    }

    fn observe_all(&self, filter: Option<String>) -> BoxStream<'static, Result<Vec<R>>> {
        let pool = Arc::clone(&self.pool);
        let receiver = self.version.subscribe();

        stream::unfold((receiver, true), move |(mut receiver, first)| {
            let pool = Arc::clone(&pool);
            let filter = filter.clone();
            async move {
                if !first && receiver.changed().await.is_err() {
                    return None;
                }
                receiver.borrow_and_update();
                let snapshot = load_scope::<R>(&pool, filter.as_deref());
                Some((snapshot, (receiver, false)))
            }
        })
        .boxed()
    }

    async fn replace_all(&self, filter: Option<String>, records: Vec<R>) -> Result<usize> {
        let synced_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let count = records.len();
        let version = Arc::clone(&self.version);

        self.writer
            .exec_then(
                move |conn: &mut SqliteConnection| -> Result<usize> {
                    R::replace(conn, filter.as_deref(), records, &synced_at)
                        .map_err(StorageError::from)?;
                    Ok(count)
                },
                move || {
                    debug!("[CatalogStorage] Replaced {} cache with {} records", R::KIND, count);
                    version.send_modify(|v| *v += 1);
                },
            )
            .await?;

        Ok(count)
    }
}

/// The three cache tables over one database file.
pub struct SqliteCatalogStorage {
    pub profiles: Arc<CatalogCacheRepository<Profile>>,
    pub categories: Arc<CatalogCacheRepository<Category>>,
    pub products: Arc<CatalogCacheRepository<Product>>,
}

impl SqliteCatalogStorage {
    /// Opens the database at `db_path`, runs migrations and starts the writer.
    pub fn open(db_path: &str) -> Result<Self> {
        let pool = db::init(db_path)?;
        let writer = db::spawn_writer(pool.clone())?;
        Ok(Self::with_pool(pool, writer))
    }

    pub fn with_pool(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SqliteCatalogStorage {
            profiles: Arc::new(CatalogCacheRepository::new(pool.clone(), writer.clone())),
            categories: Arc::new(CatalogCacheRepository::new(pool.clone(), writer.clone())),
            products: Arc::new(CatalogCacheRepository::new(pool, writer)),
        }
    }

    /// Stores for the sync facade. Repeated calls share the same repositories, so
    /// observers see every write.
    pub fn stores(&self) -> CatalogStores {
        CatalogStores {
            profiles: self.profiles.clone(),
            categories: self.categories.clone(),
            products: self.products.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn open_temp() -> (tempfile::TempDir, SqliteCatalogStorage) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let storage = SqliteCatalogStorage::open(path.to_str().unwrap()).unwrap();
        (dir, storage)
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn product(id: &str, category_id: &str) -> Product {
        Product {
            id: id.to_string(),
            product_category_id: category_id.to_string(),
            name: format!("Product {}", id),
            price: "1000".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn replace_all_keeps_fetch_order() {
        let (_dir, storage) = open_temp();
        let records = vec![category("z", "Last id"), category("a", "First id"), category("m", "Middle")];

        let written = storage.categories.replace_all(None, records.clone()).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(storage.categories.load_all(None).unwrap(), records);
    }

    #[tokio::test]
    async fn replace_all_discards_previous_rows() {
        let (_dir, storage) = open_temp();
        storage
            .categories
            .replace_all(None, vec![category("c1", "Gear"), category("c2", "Food")])
            .await
            .unwrap();

        storage
            .categories
            .replace_all(None, vec![category("c3", "Books")])
            .await
            .unwrap();

        assert_eq!(storage.categories.load_all(None).unwrap(), vec![category("c3", "Books")]);
    }

    #[tokio::test]
    async fn empty_replace_clears_the_table() {
        let (_dir, storage) = open_temp();
        storage
            .categories
            .replace_all(None, vec![category("c1", "Gear")])
            .await
            .unwrap();

        let written = storage.categories.replace_all(None, Vec::new()).await.unwrap();

        assert_eq!(written, 0);
        assert!(storage.categories.load_all(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn product_scopes_are_replaced_independently() {
        let (_dir, storage) = open_temp();
        storage
            .products
            .replace_all(Some("c1".to_string()), vec![product("p1", "c1"), product("p2", "c1")])
            .await
            .unwrap();
        storage
            .products
            .replace_all(Some("c2".to_string()), vec![product("p3", "c2")])
            .await
            .unwrap();

        storage
            .products
            .replace_all(Some("c1".to_string()), vec![product("p4", "c1")])
            .await
            .unwrap();

        assert_eq!(storage.products.load_all(Some("c1")).unwrap(), vec![product("p4", "c1")]);
        assert_eq!(storage.products.load_all(Some("c2")).unwrap(), vec![product("p3", "c2")]);
        assert_eq!(storage.products.load_all(None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn profile_round_trips_every_column() {
        let (_dir, storage) = open_temp();
        let profile = Profile {
            short_name: "acme".to_string(),
            name: "Acme Outdoor".to_string(),
            address: "Jl. Merdeka 1".to_string(),
            phone: "+62 21 555".to_string(),
            email: "hello@acme.test".to_string(),
            website: "https://acme.test".to_string(),
            logo_url: "https://acme.test/logo.png".to_string(),
            description: "Camping gear".to_string(),
        };

        storage.profiles.replace_all(None, vec![profile.clone()]).await.unwrap();

        assert_eq!(storage.profiles.load_all(None).unwrap(), vec![profile]);
    }

    #[tokio::test]
    async fn observers_see_committed_writes() {
        let (_dir, storage) = open_temp();
        let mut updates = storage.categories.observe_all(None);

        assert!(updates.next().await.unwrap().unwrap().is_empty());

        storage
            .categories
            .replace_all(None, vec![category("c1", "Gear")])
            .await
            .unwrap();
        assert_eq!(updates.next().await.unwrap().unwrap(), vec![category("c1", "Gear")]);

        let idle = tokio::time::timeout(Duration::from_millis(50), updates.next()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn observers_are_woken_when_the_writer_is_abandoned() {
        let (_dir, storage) = open_temp();
        let mut updates = storage.categories.observe_all(None);
        assert!(updates.next().await.unwrap().unwrap().is_empty());

        {
            let write = storage
                .categories
                .replace_all(None, vec![category("c1", "Gear")]);
            let mut write = std::pin::pin!(write);
            // Hands the job to the writer thread, then abandons the wait.
            let _ = futures::poll!(write.as_mut());
        }

        let woken = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .expect("observer was not woken");
        assert_eq!(woken.unwrap().unwrap(), vec![category("c1", "Gear")]);
    }

    #[tokio::test]
    async fn duplicate_keys_keep_one_row() {
        let (_dir, storage) = open_temp();

        storage
            .categories
            .replace_all(None, vec![category("c1", "Gear"), category("c1", "Gear v2")])
            .await
            .unwrap();

        assert_eq!(storage.categories.load_all(None).unwrap(), vec![category("c1", "Gear v2")]);
    }

    #[tokio::test]
    async fn data_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let path = path.to_str().unwrap();
        {
            let storage = SqliteCatalogStorage::open(path).unwrap();
            storage
                .categories
                .replace_all(None, vec![category("c1", "Gear")])
                .await
                .unwrap();
        }

        let reopened = SqliteCatalogStorage::open(path).unwrap();
        assert_eq!(reopened.categories.load_all(None).unwrap(), vec![category("c1", "Gear")]);
    }
}
