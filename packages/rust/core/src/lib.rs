//! Core pipeline orchestration for jobtracker.
//!
//! This crate ties together scraping, dataset merge, and report rendering
//! into end-to-end workflows (e.g., `run_collection`).

pub mod pipeline;

pub use pipeline::{
    ProgressReporter, RunConfig, RunSummary, SilentProgress, SourceSummary, regenerate_report,
    run_collection, summarize,
};

// Types callers need to drive a run and read its results.
pub use jobtracker_report::{ReportOptions, ReportStats};
pub use jobtracker_sources::{ScrapeMode, StopReason};
