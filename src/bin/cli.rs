//! Course catalog sync CLI
//!
//! Local and scheduled execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use catalog_sync::{
    error::Result,
    models::{Config, StoreBackend, Table},
    pipeline::{self, SyncReport},
    storage::LocalStore,
};

/// catalog-sync - University Course Catalog Sync
#[derive(Parser, Debug)]
#[command(
    name = "catalog-sync",
    version,
    about = "Mirrors a university course catalog into a persisted store"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the whole catalog and reconcile the store against it
    Sync {
        /// Compute the changes without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch the whole catalog without touching the store
    Fetch {
        /// Write the snapshot as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show store settings and local row counts
    Info,
}

/// Initialize logging; `--verbose` wins over the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_report(report: &SyncReport) {
    for (table, changes) in &report.changes {
        log::info!("  {:<12} +{} -{}", table, changes.inserted, changes.deleted);
    }
    log::info!(
        "Fetched {} departments, {} courses, {} sections ({} empty, {} malformed details, {} duplicates)",
        report.fetch.departments,
        report.fetch.courses,
        report.fetch.sections,
        report.fetch.details_empty,
        report.fetch.details_malformed,
        report.fetch.duplicate_sections
    );
    log::info!(
        "{} rows inserted, {} rows deleted in {}s{}",
        report.total_inserted(),
        report.total_deleted(),
        (report.end_time - report.start_time).num_seconds(),
        if report.dry_run { " (dry run)" } else { "" }
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load_if_present(&cli.config);
    let level = loaded
        .as_ref()
        .map_or("info", |config| config.logging.level.as_str());
    init_logging(cli.verbose, level);

    let mut config = loaded.inspect_err(|e| log::error!("Config load failed: {e}"))?;
    config.apply_env();

    if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::info!("No config at {}, using defaults", cli.config.display());
    }

    match cli.command {
        Command::Sync { dry_run } => {
            let report = pipeline::run_sync(&config, dry_run).await?;
            log_report(&report);
        }

        Command::Fetch { output } => {
            let (snapshot, stats) = pipeline::run_fetch(&config, output.as_deref()).await?;
            log::info!(
                "Snapshot: {} departments, {} courses, {} sections, {} instructors, {} meetings",
                snapshot.departments.len(),
                snapshot.courses.len(),
                snapshot.sections.len(),
                snapshot.instructors.len(),
                snapshot.meetings.len()
            );
            if stats.details_empty + stats.details_malformed > 0 {
                log::warn!(
                    "{} section details empty, {} malformed",
                    stats.details_empty,
                    stats.details_malformed
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            log::info!("Source: {}", config.source.base_url);
            match config.store.backend {
                StoreBackend::Local => {
                    log::info!("Store: local ({})", config.store.root_dir.display());
                    let store = LocalStore::new(&config.store.root_dir);
                    for table in Table::ALL {
                        let rows = store.load_rows(table).await?;
                        log::info!("  {:<12} {} rows", table, rows.len());
                    }
                }
                StoreBackend::Supabase => {
                    log::info!(
                        "Store: supabase ({})",
                        config.store.url.as_deref().unwrap_or("url not set")
                    );
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
