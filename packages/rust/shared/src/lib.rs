//! Shared types, error model, and configuration for jobtracker.
//!
//! This crate is the foundation depended on by all other jobtracker crates.
//! It provides:
//! - [`JobTrackerError`]: the unified error type
//! - Domain types ([`JobRecord`], [`JobSource`], run timestamps, [`ExecutionContext`])
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, GoogleCareersConfig, HttpConfig, LinkedInConfig, LinkedInMode,
    OutputConfig, PaginationConfig, ReportConfig, RetryConfig, ScrapeConfig, ScrollConfig,
    SearchConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{JobTrackerError, Result};
pub use types::{
    CSV_COLUMNS, ExecutionContext, JobRecord, JobSource, RUN_TIME_FORMAT, capture_run_time,
    format_run_time, is_web_link, normalize_link, parse_run_time, resolve_web_link,
};
