// src/models/mod.rs

//! Domain models for the catalog sync application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod config;
mod payload;
mod snapshot;

// Re-export all public types
pub use catalog::{
    Course, Department, InstructorAssignment, Meeting, Record, Row, RowKey, Section, SectionRecords,
    SectionRef, Table,
};
pub use config::{
    Config, CrawlerConfig, FilterConfig, LoggingConfig, SourceConfig, StoreBackend, StoreConfig,
};
pub use payload::{
    CourseStub, DepartmentStub, InstructorEntry, MeetingEntry, SectionDetail, SectionStub,
};
pub use snapshot::CatalogSnapshot;

/// Section stubs grouped by their associated-class discriminator.
pub type SectionGroups = std::collections::BTreeMap<String, Vec<SectionStub>>;
