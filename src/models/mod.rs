// src/models/mod.rs

//! Domain models for the directory.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod filter;
mod record;
pub mod states;

// Re-export all public types
pub use config::{
    Config, HttpConfig, LoggingConfig, PagingConfig, PrimaryConfig, RefreshConfig, SheetsConfig,
};
pub use filter::{FilterCriteria, county_matches};
pub use record::{DraftRecord, ProviderEnrichment, Record, RecordId};
