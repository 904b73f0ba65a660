//! Incremental, concurrent harvest engine for the WTT API.
//!
//! The pieces, in control-flow order:
//! - [`planner`] decides which units need a fetch given the on-disk store
//!   and the time-based staleness rules
//! - [`Harvester`] runs them under a bounded concurrency ceiling with
//!   per-unit failure isolation
//! - [`executor`] performs one unit's fetch+retry+write
//! - [`reconcile`] turns old/new counts into "newly added" metrics

pub mod client;
pub mod executor;
pub mod planner;
pub mod reconcile;
pub mod routes;
pub mod runner;

pub use client::{ApiClient, RetryPolicy};
pub use routes::{API_BASE_URL, Route, Routes};
pub use runner::{Harvester, ProgressReporter, SilentProgress, require_year_listings};
