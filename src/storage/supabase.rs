//! Supabase storage implementation.
//!
//! Talks to the project's PostgREST endpoint (`{url}/rest/v1/{table}`):
//! - select: `GET ?select=<key columns>`, paged with `limit`/`offset`
//! - insert: `POST` a JSON array with `Prefer: return=minimal`
//! - delete: `DELETE ?<column>=eq.<value>` for every key column

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Row, RowKey, Table};
use crate::storage::CatalogStore;

/// Rows requested per select page.
const PAGE_SIZE: usize = 1000;

/// Supabase (PostgREST) storage backend.
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
}

impl SupabaseStore {
    /// Create a store for the project at `url` authenticated with `key`.
    pub fn new(url: &str, key: &str, crawler: &CrawlerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(key)
            .map_err(|e| AppError::config(format!("invalid supabase key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| AppError::config(format!("invalid supabase key: {e}")))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .user_agent(&crawler.user_agent)
            .timeout(Duration::from_secs(crawler.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.rest_url, table.name())
    }

    /// Turn a non-success response into a store error carrying the body.
    async fn check(response: Response, action: &str, table: Table) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::store(format!(
            "{action} on {table} failed with HTTP {status}: {body}"
        )))
    }
}

#[async_trait]
impl CatalogStore for SupabaseStore {
    async fn select_keys(&self, table: Table) -> Result<Vec<RowKey>> {
        let columns = table.key_columns().join(",");
        let mut keys = Vec::new();

        loop {
            let offset = keys.len().to_string();
            let limit = PAGE_SIZE.to_string();
            let response = self
                .client
                .get(self.table_url(table))
                .query(&[
                    ("select", columns.as_str()),
                    ("order", columns.as_str()),
                    ("limit", limit.as_str()),
                    ("offset", offset.as_str()),
                ])
                .send()
                .await
                .map_err(AppError::store)?;
            let rows: Vec<Row> = Self::check(response, "select", table)
                .await?
                .json()
                .await
                .map_err(AppError::store)?;
            let page_len = rows.len();

            for row in &rows {
                keys.push(RowKey::from_row(table, row)?);
            }
            if page_len < PAGE_SIZE {
                break;
            }
        }

        log::debug!("Selected {} keys from {}", keys.len(), table);
        Ok(keys)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(AppError::store)?;
        Self::check(response, "insert", table).await?;
        Ok(())
    }

    async fn delete(&self, table: Table, key: &RowKey) -> Result<()> {
        let filters: Vec<(&str, String)> = table
            .key_columns()
            .iter()
            .zip(key.parts())
            .map(|(column, value)| (*column, format!("eq.{value}")))
            .collect();

        let response = self
            .client
            .delete(self.table_url(table))
            .query(&filters)
            .send()
            .await
            .map_err(AppError::store)?;
        Self::check(response, "delete", table).await?;
        Ok(())
    }
}
