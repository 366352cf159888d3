// src/pipeline/run.rs

//! Entry points wiring configuration, client, and store together.

use std::path::Path;

use crate::error::Result;
use crate::models::{CatalogSnapshot, Config};
use crate::pipeline::sync::{CatalogSynchronizer, CatalogTraversal, FetchStats, SyncReport};
use crate::services::CatalogClient;
use crate::storage::{self, CatalogStore};

/// Run one full sweep against the configured store.
pub async fn run_sync(config: &Config, dry_run: bool) -> Result<SyncReport> {
    config.validate()?;
    let store = storage::open(config)?;
    run_sync_with(config, store.as_ref(), dry_run).await
}

/// Run one full sweep against the given store.
pub async fn run_sync_with(
    config: &Config,
    store: &dyn CatalogStore,
    dry_run: bool,
) -> Result<SyncReport> {
    let client = CatalogClient::new(config)?;
    log::info!("Syncing catalog from {}", config.source.base_url);

    CatalogSynchronizer::new(&client, store, &config.crawler)
        .dry_run(dry_run)
        .fetch_and_sync_all()
        .await
}

/// Fetch a snapshot without touching any store, optionally writing it as JSON.
pub async fn run_fetch(
    config: &Config,
    output: Option<&Path>,
) -> Result<(CatalogSnapshot, FetchStats)> {
    config.validate()?;
    let client = CatalogClient::new(config)?;

    let (snapshot, stats) = CatalogTraversal::new(&client, &config.crawler)
        .fetch_snapshot()
        .await?;
    snapshot.validate()?;

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        log::info!("Snapshot written to {}", path.display());
    }

    Ok((snapshot, stats))
}
