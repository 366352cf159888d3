//! Local filesystem storage implementation.
//!
//! Keeps each table as a JSON array of rows, for development and testing.
//! Production deployments should use SupabaseStore.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── departments.json
//! ├── courses.json
//! ├── sections.json
//! ├── instructors.json
//! └── meetings.json
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Row, RowKey, Table};
use crate::storage::CatalogStore;

/// Local filesystem storage backend.
pub struct LocalStore {
    root_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, table: Table) -> PathBuf {
        self.root_dir.join(format!("{}.json", table.name()))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Every row of a table; a missing file is an empty table.
    pub async fn load_rows(&self, table: Table) -> Result<Vec<Row>> {
        match tokio::fs::read(self.path(table)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save_rows(&self, table: Table, rows: &[Row]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(rows)?;
        self.write_bytes(&self.path(table), &bytes).await
    }
}

#[async_trait]
impl CatalogStore for LocalStore {
    async fn select_keys(&self, table: Table) -> Result<Vec<RowKey>> {
        self.load_rows(table)
            .await?
            .iter()
            .map(|row| RowKey::from_row(table, row))
            .collect()
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        for row in &rows {
            RowKey::from_row(table, row)?;
        }

        let _guard = self.write_lock.lock().await;
        let mut existing = self.load_rows(table).await?;
        existing.extend(rows);
        self.save_rows(table, &existing).await
    }

    async fn delete(&self, table: Table, key: &RowKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load_rows(table).await?;
        let before = rows.len();
        rows.retain(|row| RowKey::from_row(table, row).map_or(true, |k| &k != key));

        if rows.len() != before {
            self.save_rows(table, &rows).await?;
        }
        Ok(())
    }
}
