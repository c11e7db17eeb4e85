//! Connection pool, embedded migrations and the single-writer actor.

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, error, info};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use catalog_core::errors::{Error, Result};

use crate::errors::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const POOL_SIZE: u32 = 4;

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA synchronous = NORMAL;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// Opens (creating if needed) the cache database and brings its schema up to date.
pub fn init(db_path: &str) -> Result<Arc<DbPool>> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!(
                    "Cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let pool = create_pool(db_path)?;
    run_migrations(&pool)?;
    info!("[CatalogStorage] Cache database ready at {}", db_path);
    Ok(pool)
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(StorageError::from)?;
    Ok(Arc::new(pool))
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut pooled = get_connection(pool)?;
    let conn: &mut SqliteConnection = &mut pooled;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    for version in &applied {
        debug!("[CatalogStorage] Applied migration {}", version);
    }
    Ok(())
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    Ok(pool.get().map_err(StorageError::from)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

type Job = Box<dyn FnOnce(&DbPool) + Send>;

/// Errors raised inside a writer transaction.
enum TransactionError {
    Job(Error),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TransactionError {
    fn from(err: diesel::result::Error) -> Self {
        TransactionError::Diesel(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Job(e) => e,
            TransactionError::Diesel(e) => StorageError::from(e).into(),
        }
    }
}

/// Handle to the dedicated writer thread. All cache writes go through it, one
/// at a time, each inside its own transaction.
#[derive(Clone)]
pub struct WriteHandle {
    jobs: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Runs `job` in a transaction on the writer thread. A job error rolls the
    /// whole transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.exec_then(job, || {}).await
    }

    /// Like [`exec`](Self::exec), and runs `on_commit` on the writer thread once
    /// the transaction has committed. `on_commit` runs even if the caller stops
    /// waiting for the result.
    pub async fn exec_then<F, T, C>(&self, job: F, on_commit: C) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        let job: Job = Box::new(move |pool: &DbPool| {
            let result = get_connection(pool).and_then(|mut pooled| {
                let conn: &mut SqliteConnection = &mut pooled;
                conn.transaction::<T, TransactionError, _>(|tx| {
                    job(tx).map_err(TransactionError::Job)
                })
                .map_err(Error::from)
            });
            if result.is_ok() {
                on_commit();
            }
            // Caller may have gone away; nothing to report to.
            let _ = reply.send(result);
        });

        self.jobs
            .send(job)
            .map_err(|_| StorageError::Writer("writer thread has stopped".to_string()))?;
        outcome.await.map_err(|_| {
            StorageError::Writer("writer dropped the job without answering".to_string())
        })?
    }
}

/// Starts the writer thread. It stops once every `WriteHandle` is dropped.
pub fn spawn_writer(pool: Arc<DbPool>) -> Result<WriteHandle> {
    let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
    std::thread::Builder::new()
        .name("catalog-db-writer".to_string())
        .spawn(move || {
            while let Some(job) = queue.blocking_recv() {
                job(&pool);
            }
            debug!("[CatalogStorage] Writer thread exiting");
        })
        .map_err(|e| {
            error!("[CatalogStorage] Failed to start writer thread: {}", e);
            StorageError::Writer(e.to_string())
        })?;
    Ok(WriteHandle { jobs })
}
