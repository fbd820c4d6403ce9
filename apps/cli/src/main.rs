//! jobtracker CLI: scheduled job-listing collection and dashboard publishing.
//!
//! Scrapes LinkedIn and Google Careers, merges the results into a
//! link-deduplicated CSV, and renders an interactive HTML report.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
