mod args;
mod render;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::stream::{BoxStream, StreamExt};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use catalog_api::{ApiConfig, CatalogApiClient};
use catalog_core::catalog::CatalogRecord;
use catalog_core::sync::{
    CatalogStores, CatalogSync, CatalogSyncServiceTrait, StaticSessionProvider, SyncResult,
};
use catalog_storage_sqlite::SqliteCatalogStorage;

use args::{Cli, Command, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = ApiConfig::new(&cli.api_url).with_timeout(Duration::from_secs(cli.timeout_secs));
    let client = CatalogApiClient::new(&config).context("Invalid API configuration")?;

    let stores = if cli.memory {
        CatalogStores::in_memory()
    } else {
        SqliteCatalogStorage::open(&cli.db_path)
            .with_context(|| format!("Failed to open cache database {}", cli.db_path))?
            .stores()
    };

    if cli.session_token.is_none() {
        warn!("[CatalogCli] No session token configured; requests will be refused locally");
    }
    let session = Arc::new(StaticSessionProvider::new(cli.session_token.clone()));
    let catalog = CatalogSync::new(Arc::new(client), stores, session);

    let mode = Mode::from_flags(cli.refresh, cli.watch);
    match &cli.command {
        Command::Profile => follow(catalog.profiles().observe(cli.refresh), mode, cli.format).await,
        Command::Categories => {
            follow(catalog.categories().observe(cli.refresh), mode, cli.format).await
        }
        Command::Products { category } => {
            follow(catalog.products(category).observe(cli.refresh), mode, cli.format).await
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Print until the stream ends (forced refresh streams are finite).
    UntilEnd,
    /// Print the first non-loading emission and stop. A cached answer ends the
    /// command before its background revalidation completes, so the cache is
    /// only brought up to date by `--refresh` or `--watch`.
    FirstResult,
    /// Print until Ctrl-C.
    Watch,
}

impl Mode {
    fn from_flags(refresh: bool, watch: bool) -> Self {
        match (refresh, watch) {
            (_, true) => Mode::Watch,
            (true, false) => Mode::UntilEnd,
            (false, false) => Mode::FirstResult,
        }
    }
}

async fn follow<R: CatalogRecord>(
    mut updates: BoxStream<'static, SyncResult<R>>,
    mode: Mode,
    format: OutputFormat,
) -> Result<()> {
    let mut last = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            next = updates.next() => {
                let Some(result) = next else { break };
                println!("{}", render::line(&result, format)?);
                let settled = !result.is_loading();
                last = Some(result);
                if settled && mode == Mode::FirstResult {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("[CatalogCli] Interrupted, closing subscription");
                return Ok(());
            }
        }
    }

    match last {
        Some(SyncResult::Error(err)) if mode != Mode::Watch => bail!("{}", err),
        _ => Ok(()),
    }
}
