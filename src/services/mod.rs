//! Service layer for the catalog sync application.
//!
//! This module contains the business logic for:
//! - Remote catalog traversal (`CatalogClient`, behind `CatalogSource`)
//! - Section detail normalization (`CatalogExtractor`)

mod client;
mod extractor;

pub use client::{CatalogClient, CatalogSource};
pub use extractor::CatalogExtractor;
