//! Pipeline entry points for catalog operations.
//!
//! - `run_sync`: Fetch the whole catalog and reconcile the store against it
//! - `run_fetch`: Fetch the whole catalog without touching the store

pub mod reconcile;
pub mod run;
pub mod sync;

pub use reconcile::{ReconcilePlan, TableChanges, reconcile};
pub use run::{run_fetch, run_sync, run_sync_with};
pub use sync::{CatalogSynchronizer, CatalogTraversal, FetchStats, SyncReport};
