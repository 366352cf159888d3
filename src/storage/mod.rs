//! Storage abstractions for the persisted catalog.
//!
//! The store holds five logical tables (see [`Table`]). Each supports exactly
//! three operations: read every key, insert a batch of rows, and delete the
//! rows matching one key.
//!
//! ## Backends
//!
//! ```text
//! LocalStore      {root}/departments.json, courses.json, ...  (development)
//! SupabaseStore   {url}/rest/v1/{table}                       (production)
//! ```

pub mod local;
pub mod supabase;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Config, Row, RowKey, StoreBackend, Table};

// Re-export for convenience
pub use local::LocalStore;
pub use supabase::SupabaseStore;

/// Trait for catalog storage backends.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Natural keys of every row currently in `table`.
    async fn select_keys(&self, table: Table) -> Result<Vec<RowKey>>;

    /// Insert rows into `table` as one batch.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<()>;

    /// Delete every row of `table` whose natural key equals `key`.
    async fn delete(&self, table: Table, key: &RowKey) -> Result<()>;
}

/// Open the backend selected in the configuration.
pub fn open(config: &Config) -> Result<Box<dyn CatalogStore>> {
    match config.store.backend {
        StoreBackend::Local => Ok(Box::new(LocalStore::new(&config.store.root_dir))),
        StoreBackend::Supabase => {
            let (Some(url), Some(key)) = (&config.store.url, &config.store.key) else {
                return Err(AppError::config(
                    "store.url and store.key are required for the supabase backend",
                ));
            };
            Ok(Box::new(SupabaseStore::new(url, key, &config.crawler)?))
        }
    }
}
