//! Error types for ttharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all harvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Connection-level or timeout failure. Retryable.
    #[error("transient network error: {0}")]
    Transient(String),

    /// Non-2xx HTTP response. Not retried within a run.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Response body was not in an expected shape.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Raw store read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Fatal error while planning the run's work set.
    #[error("planning error: {message}")]
    Planning { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    /// Create a planning error from any displayable message.
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the retry loop should take another attempt at this error.
    ///
    /// Only connection-level and timeout failures self-resolve within a run;
    /// a 4xx/5xx is assumed to keep answering the same way.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
