//! Shared types, error model, and configuration for ttharvest.
//!
//! This crate is the foundation depended on by all other ttharvest crates.
//! It provides:
//! - [`HarvestError`] — the unified error type
//! - Domain types ([`WorkUnit`], [`FetchOutcome`], [`RunSummary`], [`EventRecord`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, HarvestConfig, PolitenessConfig, RetryConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    API_DATETIME_FORMAT, EventRecord, EventStatus, FetchOutcome, ONGOING_WINDOW, PayloadShape,
    RunSummary, WorkUnit, YEAR_LOOKAHEAD,
};
