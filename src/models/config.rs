//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable overriding `source.base_url`.
pub const ENV_BASE_URL: &str = "CATALOG_BASE_URL";
/// Environment variable overriding `store.url`.
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
/// Environment variable overriding `store.key`.
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_KEY";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote catalog location
    #[serde(default)]
    pub source: SourceConfig,

    /// Which departments and courses to keep
    #[serde(default)]
    pub filters: FilterConfig,

    /// HTTP and traversal behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Persisted store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration if the file exists, or return the defaults.
    ///
    /// A file that exists but fails to read or parse is an error.
    pub fn load_if_present(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).map_err(|e| AppError::config(format!("{}: {e}", path.display())))
    }

    /// Override the base URL and store credentials from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.source.base_url = url;
        }
        if let Some(url) = lookup(ENV_SUPABASE_URL) {
            self.store.url = Some(url);
        }
        if let Some(key) = lookup(ENV_SUPABASE_KEY) {
            self.store.key = Some(key);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.trim().is_empty() {
            return Err(AppError::validation("source.base_url is empty"));
        }
        url::Url::parse(&self.source.base_url)?;
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.filters.course_number_cutoff == 0 {
            return Err(AppError::validation(
                "filters.course_number_cutoff must be > 0",
            ));
        }
        if self.store.backend == StoreBackend::Supabase {
            let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
            if !has(&self.store.url) || !has(&self.store.key) {
                return Err(AppError::validation(
                    "store.url and store.key are required for the supabase backend",
                ));
            }
        }
        Ok(())
    }
}

/// Remote catalog location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Semester root of the course outline API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
        }
    }
}

/// Department and course filtering rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Department codes with no numbered undergraduate offerings
    #[serde(default)]
    pub excluded_departments: Vec<String>,

    /// Course numbers above this value are graduate level and skipped
    #[serde(default = "defaults::course_number_cutoff")]
    pub course_number_cutoff: u32,

    /// Courses whose title contains any of these are skipped
    #[serde(default = "defaults::excluded_title_keywords")]
    pub excluded_title_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_departments: Vec::new(),
            course_number_cutoff: defaults::course_number_cutoff(),
            excluded_title_keywords: defaults::excluded_title_keywords(),
        }
    }
}

/// HTTP client and traversal behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: 0,
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files on the local filesystem
    #[default]
    Local,
    /// Supabase (PostgREST) over HTTP
    Supabase,
}

/// Persisted store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::store_root")]
    pub root_dir: PathBuf,

    /// Project URL for the supabase backend
    #[serde(default)]
    pub url: Option<String>,

    /// Service key for the supabase backend
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            root_dir: defaults::store_root(),
            url: None,
            key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn base_url() -> String {
        "http://www.sfu.ca/bin/wcm/course-outlines?2025/summer".into()
    }

    // Filter defaults
    pub fn course_number_cutoff() -> u32 {
        500
    }
    pub fn excluded_title_keywords() -> Vec<String> {
        vec!["Practicum".into(), "Research Project".into()]
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        concat!("catalog-sync/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        4
    }

    pub fn store_root() -> PathBuf {
        PathBuf::from("storage")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
