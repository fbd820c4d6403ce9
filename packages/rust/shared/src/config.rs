//! Application configuration for jobtracker.
//!
//! User config lives at `~/.jobtracker/jobtracker.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JobTrackerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jobtracker.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jobtracker";

// ---------------------------------------------------------------------------
// Config structs (matching jobtracker.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// What to search for.
    #[serde(default)]
    pub search: SearchConfig,

    /// Where results go.
    #[serde(default)]
    pub output: OutputConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry/backoff policy for page fetches.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Delays and limits between result pages.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// LinkedIn job board.
    #[serde(default)]
    pub linkedin: LinkedInConfig,

    /// Google Careers site.
    #[serde(default)]
    pub google_careers: GoogleCareersConfig,

    /// Infinite-scroll emulation (browser mode).
    #[serde(default)]
    pub scroll: ScrollConfig,

    /// Headless browser settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// HTML report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            position: default_position(),
            country: default_country(),
        }
    }
}

fn default_position() -> String {
    "Data Scientist".into()
}
fn default_country() -> String {
    "Israel".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Cumulative CSV dataset.
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    /// Generated HTML report.
    #[serde(default = "default_report_path")]
    pub report_path: String,
    /// Regenerate the report after each run.
    #[serde(default = "default_true")]
    pub render_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            report_path: default_report_path(),
            render_report: true,
        }
    }
}

fn default_csv_path() -> String {
    "jobs.csv".into()
}
fn default_report_path() -> String {
    "jobs_dashboard.html".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per page before the source gives up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base wait after an HTTP 429.
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait_secs: u64,
    /// Upper bound of the random extra wait added after an HTTP 429.
    #[serde(default = "default_rate_limit_jitter")]
    pub rate_limit_jitter_secs: u64,
    /// Wait after a transport error or non-success status.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            rate_limit_wait_secs: default_rate_limit_wait(),
            rate_limit_jitter_secs: default_rate_limit_jitter(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_rate_limit_wait() -> u64 {
    60
}
fn default_rate_limit_jitter() -> u64 {
    30
}
fn default_error_backoff() -> u64 {
    10
}

/// `[pagination]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_delay_min")]
    pub page_delay_min_ms: u64,
    #[serde(default = "default_page_delay_max")]
    pub page_delay_max_ms: u64,
    /// Hard stop on result pages per source, whatever the board reports.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_delay_min_ms: default_page_delay_min(),
            page_delay_max_ms: default_page_delay_max(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_page_delay_min() -> u64 {
    2000
}
fn default_page_delay_max() -> u64 {
    4000
}
fn default_max_pages() -> u32 {
    40
}

/// How LinkedIn result pages are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedInMode {
    /// Plain HTTP requests paged with the `start` offset.
    #[default]
    Http,
    /// Headless browser, scrolling the result list until it stops growing.
    Browser,
}

impl std::str::FromStr for LinkedInMode {
    type Err = JobTrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "browser" => Ok(Self::Browser),
            other => Err(JobTrackerError::config(format!(
                "unknown linkedin mode '{other}': expected 'http' or 'browser'"
            ))),
        }
    }
}

/// `[linkedin]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_linkedin_url")]
    pub base_url: String,
    /// LinkedIn geo identifier for the searched country.
    #[serde(default = "default_geo_id")]
    pub geo_id: String,
    /// `f_TPR` filter (`r86400` = posted in the last 24 hours). Empty disables it.
    #[serde(default = "default_posted_within")]
    pub posted_within: String,
    #[serde(default = "default_linkedin_max_results")]
    pub max_results: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub mode: LinkedInMode,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_linkedin_url(),
            geo_id: default_geo_id(),
            posted_within: default_posted_within(),
            max_results: default_linkedin_max_results(),
            page_size: default_page_size(),
            mode: LinkedInMode::default(),
        }
    }
}

fn default_linkedin_url() -> String {
    "https://www.linkedin.com/jobs/search".into()
}
fn default_geo_id() -> String {
    "101620260".into()
}
fn default_posted_within() -> String {
    "r86400".into()
}
fn default_linkedin_max_results() -> usize {
    100
}
fn default_page_size() -> usize {
    25
}

/// `[google_careers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleCareersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_google_url")]
    pub base_url: String,
    #[serde(default = "default_google_max_results")]
    pub max_results: usize,
}

impl Default for GoogleCareersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_google_url(),
            max_results: default_google_max_results(),
        }
    }
}

fn default_google_url() -> String {
    "https://www.google.com/about/careers/applications/jobs/results/".into()
}
fn default_google_max_results() -> usize {
    100
}

/// `[scroll]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Upper bound on scroll attempts.
    #[serde(default = "default_scroll_attempts")]
    pub max_attempts: u32,
    /// Consecutive attempts without new results before stopping.
    #[serde(default = "default_stable_rounds")]
    pub stable_rounds: u32,
    /// Wait after each scroll for lazy content to load.
    #[serde(default = "default_scroll_wait")]
    pub wait_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_scroll_attempts(),
            stable_rounds: default_stable_rounds(),
            wait_ms: default_scroll_wait(),
        }
    }
}

fn default_scroll_attempts() -> u32 {
    50
}
fn default_stable_rounds() -> u32 {
    2
}
fn default_scroll_wait() -> u64 {
    2000
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Explicit Chrome/Chromium binary. Autodetected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
        }
    }
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Page heading. Defaults to "<position> Jobs in <country>".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_top_companies")]
    pub top_companies: usize,
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,
    #[serde(default = "default_latest_count")]
    pub latest_count: usize,
    /// Words dropped from the title keyword chart.
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: None,
            top_companies: default_top_companies(),
            top_keywords: default_top_keywords(),
            latest_count: default_latest_count(),
            stop_words: default_stop_words(),
        }
    }
}

fn default_top_companies() -> usize {
    10
}
fn default_top_keywords() -> usize {
    20
}
fn default_latest_count() -> usize {
    10
}
fn default_stop_words() -> Vec<String> {
    [
        "senior", "lead", "israel", "aviv", "with", "team", "developer", "junior",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Scrape config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Attempts per page.
    pub max_retries: u32,
    /// Base wait after HTTP 429.
    pub rate_limit_wait: Duration,
    /// Max random extra wait after HTTP 429.
    pub rate_limit_jitter: Duration,
    /// Wait after other failures.
    pub error_backoff: Duration,
    /// Random delay range between pages.
    pub page_delay_min: Duration,
    pub page_delay_max: Duration,
    /// Hard stop on pages per source.
    pub max_pages: u32,
    /// Scroll loop bounds.
    pub scroll_max_attempts: u32,
    pub scroll_stable_rounds: u32,
    pub scroll_wait: Duration,
    /// Browser session settings.
    pub headless: bool,
    pub sandbox: bool,
    pub chrome_path: Option<PathBuf>,
}

impl From<&AppConfig> for ScrapeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.http.timeout_secs),
            max_retries: config.retry.max_retries,
            rate_limit_wait: Duration::from_secs(config.retry.rate_limit_wait_secs),
            rate_limit_jitter: Duration::from_secs(config.retry.rate_limit_jitter_secs),
            error_backoff: Duration::from_secs(config.retry.error_backoff_secs),
            page_delay_min: Duration::from_millis(config.pagination.page_delay_min_ms),
            page_delay_max: Duration::from_millis(config.pagination.page_delay_max_ms),
            max_pages: config.pagination.max_pages,
            scroll_max_attempts: config.scroll.max_attempts,
            scroll_stable_rounds: config.scroll.stable_rounds,
            scroll_wait: Duration::from_millis(config.scroll.wait_ms),
            headless: config.browser.headless,
            sandbox: true,
            chrome_path: config.browser.chrome_path.as_ref().map(PathBuf::from),
        }
    }
}

impl ScrapeConfig {
    /// A config with every wait set to zero, for tests against mock servers.
    pub fn without_delays() -> Self {
        let mut config = Self::from(&AppConfig::default());
        config.rate_limit_wait = Duration::ZERO;
        config.rate_limit_jitter = Duration::ZERO;
        config.error_backoff = Duration::ZERO;
        config.page_delay_min = Duration::ZERO;
        config.page_delay_max = Duration::ZERO;
        config.scroll_wait = Duration::ZERO;
        config.timeout = Duration::from_secs(5);
        config
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jobtracker/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| JobTrackerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jobtracker/jobtracker.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JobTrackerError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        JobTrackerError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings that would make a run meaningless.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.search.position.trim().is_empty() {
        return Err(JobTrackerError::config("search.position must not be empty"));
    }
    if config.retry.max_retries == 0 {
        return Err(JobTrackerError::config("retry.max_retries must be at least 1"));
    }
    if config.linkedin.page_size == 0 {
        return Err(JobTrackerError::config("linkedin.page_size must be at least 1"));
    }
    if config.pagination.page_delay_min_ms > config.pagination.page_delay_max_ms {
        return Err(JobTrackerError::config(
            "pagination.page_delay_min_ms must not exceed page_delay_max_ms",
        ));
    }
    if config.scroll.stable_rounds == 0 {
        return Err(JobTrackerError::config("scroll.stable_rounds must be at least 1"));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JobTrackerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| JobTrackerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JobTrackerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("csv_path"));
        assert!(toml_str.contains("101620260"));
        assert!(toml_str.contains("mode = \"http\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retry.max_retries, 3);
        assert_eq!(parsed.linkedin.page_size, 25);
        assert_eq!(parsed.search.country, "Israel");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[search]
position = "ML Engineer"

[linkedin]
mode = "browser"
max_results = 40
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.search.position, "ML Engineer");
        assert_eq!(config.search.country, "Israel");
        assert_eq!(config.linkedin.mode, LinkedInMode::Browser);
        assert_eq!(config.linkedin.max_results, 40);
        assert_eq!(config.linkedin.page_size, 25);
        assert!(config.google_careers.enabled);
    }

    #[test]
    fn scrape_config_from_app_config() {
        let app = AppConfig::default();
        let scrape = ScrapeConfig::from(&app);
        assert_eq!(scrape.max_retries, 3);
        assert_eq!(scrape.rate_limit_wait, Duration::from_secs(60));
        assert_eq!(scrape.rate_limit_jitter, Duration::from_secs(30));
        assert_eq!(scrape.page_delay_min, Duration::from_millis(2000));
        assert_eq!(scrape.scroll_stable_rounds, 2);
        assert!(scrape.sandbox);
    }

    #[test]
    fn validation_rejects_zero_retries() {
        let mut config = AppConfig::default();
        config.retry.max_retries = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_retries"));

        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn linkedin_mode_from_str() {
        assert_eq!("Browser".parse::<LinkedInMode>().unwrap(), LinkedInMode::Browser);
        assert!("ftp".parse::<LinkedInMode>().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("jt-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("jobtracker.toml");
        std::fs::write(&path, "[output]\ncsv_path = \"/tmp/ds.csv\"\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.output.csv_path, "/tmp/ds.csv");
        assert!(config.output.render_report);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
