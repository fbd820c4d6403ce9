//! Error types for jobtracker.
//!
//! Library crates use [`JobTrackerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all jobtracker operations.
#[derive(Debug, thiserror::Error)]
pub enum JobTrackerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a listing page.
    #[error("network error: {0}")]
    Network(String),

    /// A page kept failing (or kept being rate limited) until the retry budget ran out.
    #[error("retries exhausted after {attempts} attempts: {url}")]
    RetriesExhausted { url: String, attempts: u32 },

    /// HTML parsing or listing extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// CSV dataset read/write error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Headless browser session error.
    #[error("browser error: {0}")]
    Browser(String),

    /// Report rendering error.
    #[error("report error: {0}")]
    Report(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, empty query, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, JobTrackerError>;

impl JobTrackerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// Whether this error means the source gave up after its retry budget.
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
