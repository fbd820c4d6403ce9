//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use jobtracker_core::{
    ProgressReporter, ReportOptions, RunConfig, RunSummary, ScrapeMode, SourceSummary,
    regenerate_report, run_collection, summarize,
};
use jobtracker_shared::{
    AppConfig, ExecutionContext, JobSource, LinkedInMode, init_config, load_config,
    load_config_from, validate_config,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// jobtracker: collect job postings and publish a dashboard.
#[derive(Parser)]
#[command(
    name = "jobtracker",
    version,
    about = "Scrape LinkedIn and Google Careers listings into a deduplicated CSV and an HTML dashboard.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.jobtracker/jobtracker.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Running on a CI runner: no spinner, no colours, headless browser without sandbox.
    #[arg(
        long,
        env = "CI",
        global = true,
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new(),
    )]
    pub ci: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn context(&self) -> ExecutionContext {
        if self.ci {
            ExecutionContext::Ci
        } else {
            ExecutionContext::Local
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scrape all enabled boards, update the CSV, and render the report.
    Run(RunArgs),

    /// Render the report from the existing CSV without scraping.
    Report {
        /// Dataset CSV (defaults to output.csv_path).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Report file to write (defaults to output.report_path).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print dataset totals, per-source counts, runs, and top companies.
    Summary {
        /// Dataset CSV (defaults to output.csv_path).
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `run`. Each one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Position keywords to search for.
    #[arg(long)]
    pub position: Option<String>,

    /// Country or region to search in.
    #[arg(long)]
    pub country: Option<String>,

    /// Cap on records collected per board.
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Dataset CSV path.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Report output path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Skip rendering the report.
    #[arg(long)]
    pub no_report: bool,

    /// Scrape LinkedIn through a headless browser with infinite scroll.
    #[arg(long)]
    pub browser: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(position) = &self.position {
            config.search.position = position.clone();
        }
        if let Some(country) = &self.country {
            config.search.country = country.clone();
        }
        if let Some(csv) = &self.csv {
            config.output.csv_path = csv.to_string_lossy().into_owned();
        }
        if let Some(report) = &self.report {
            config.output.report_path = report.to_string_lossy().into_owned();
        }
        if self.no_report {
            config.output.render_report = false;
        }
        if self.browser {
            config.linkedin.mode = LinkedInMode::Browser;
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "jobtracker=info",
        1 => "jobtracker=debug",
        _ => "jobtracker=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));
    let ansi = !cli.context().is_ci();

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(ansi)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let context = cli.context();
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Run(args) => cmd_run(config_path, &args, context).await,
        Command::Report { csv, out } => cmd_report(config_path, csv, out),
        Command::Summary { csv } => cmd_summary(config_path, csv),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config from `--config` or the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs, context: ExecutionContext) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    args.apply(&mut config);
    validate_config(&config)?;

    let mut run_config = RunConfig::new(config, context);
    if let Some(n) = args.max_results {
        if n == 0 {
            return Err(eyre!("--max-results must be at least 1"));
        }
        run_config = run_config.with_max_results(n);
    }

    info!(
        position = %run_config.app.search.position,
        country = %run_config.app.search.country,
        ci = context.is_ci(),
        "starting run"
    );

    let reporter: Box<dyn ProgressReporter> = if context.is_ci() {
        Box::new(PlainProgress)
    } else {
        Box::new(CliProgress::new())
    };

    let summary = run_collection(&run_config, reporter.as_ref()).await?;
    print_run_summary(&summary);
    Ok(())
}

fn cmd_report(config_path: Option<&Path>, csv: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let csv = csv.unwrap_or_else(|| PathBuf::from(&config.output.csv_path));
    let out = out.unwrap_or_else(|| PathBuf::from(&config.output.report_path));

    if !csv.exists() {
        return Err(eyre!("no dataset at '{}'. Run `jobtracker run` first.", csv.display()));
    }

    let count = regenerate_report(&csv, &out, &ReportOptions::from_config(&config))?;
    println!("Report written to {} ({count} jobs)", out.display());
    Ok(())
}

fn cmd_summary(config_path: Option<&Path>, csv: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let csv = csv.unwrap_or_else(|| PathBuf::from(&config.output.csv_path));
    let stats = summarize(&csv, &ReportOptions::from_config(&config))?;

    println!();
    println!("  Dataset:   {}", csv.display());
    println!("  Total:     {}", stats.total);
    for (source, count) in &stats.sources {
        println!("  {:<10} {count}", format!("{source}:"));
    }
    println!("  Runs:      {}", stats.runs.len());
    println!(
        "  Last run:  {}",
        stats.last_run_id.as_deref().unwrap_or("never")
    );
    if !stats.top_companies.is_empty() {
        println!();
        println!("  Top companies:");
        for (company, count) in &stats.top_companies {
            println!("    {count:>4}  {company}");
        }
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("  Run {} complete", summary.run_id);
    for source in &summary.sources {
        let note = match (&source.error, source.is_degraded()) {
            (Some(e), _) => format!(" (failed: {e})"),
            (None, true) => " (partial)".to_string(),
            (None, false) => String::new(),
        };
        println!(
            "  {:<16} {} jobs{note}",
            format!("{}:", source.source),
            source.collected
        );
    }
    println!("  New:       {}", summary.added);
    println!("  Updated:   {}", summary.updated);
    println!("  Total:     {}", summary.total);
    println!("  CSV:       {}", summary.csv_path.display());
    if let Some(report) = &summary.report_path {
        println!("  Report:    {}", report.display());
    }
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// Progress reporters
// ---------------------------------------------------------------------------

/// Interactive progress: a single spinner line.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_started(&self, source: JobSource, mode: ScrapeMode) {
        self.spinner
            .set_message(format!("Scraping {source} ({})", mode_label(mode)));
    }

    fn source_finished(&self, summary: &SourceSummary) {
        self.spinner.println(format!(
            "  {} {}: {} jobs",
            if summary.is_degraded() { "!" } else { "✓" },
            summary.source,
            summary.collected
        ));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

/// CI progress: one plain line per event, no terminal control codes.
struct PlainProgress;

impl ProgressReporter for PlainProgress {
    fn phase(&self, name: &str) {
        println!("{name}...");
    }

    fn source_started(&self, source: JobSource, mode: ScrapeMode) {
        println!("Scraping {source} for jobs ({})...", mode_label(mode));
    }

    fn source_finished(&self, summary: &SourceSummary) {
        println!("{}: {} jobs", summary.source, summary.collected);
    }

    fn done(&self, summary: &RunSummary) {
        println!("Dataset now holds {} jobs ({} new)", summary.total, summary.added);
    }
}

fn mode_label(mode: ScrapeMode) -> &'static str {
    match mode {
        ScrapeMode::Http => "http",
        ScrapeMode::Browser => "browser",
    }
}
