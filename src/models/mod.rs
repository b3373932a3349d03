// src/models/mod.rs

//! Domain models for the monitoring workflow.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, EmailConfig, FieldSelector, ListingSelectors, LoggingConfig, RunConfig,
    ScheduleConfig, SearchFilters, SourceConfig,
};
pub use record::{IdentityKey, Record};
pub use snapshot::{Category, FilterSpec, LineageKey, Snapshot, Timestamp};
