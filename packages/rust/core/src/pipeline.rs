//! End-to-end collection run: scrape → merge with dataset → save CSV → render report.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use jobtracker_report::{ReportOptions, ReportStats, render_report, write_report};
use jobtracker_shared::{
    AppConfig, ExecutionContext, JobSource, LinkedInMode, Result, ScrapeConfig, capture_run_time,
    format_run_time,
};
use jobtracker_sources::{BoardRegistry, JobScraper, ScrapeMode, ScrapeOutcome, SearchQuery, StopReason};
use jobtracker_storage::JobStore;

/// Everything a collection run needs, already merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Search, output, board and report settings.
    pub app: AppConfig,
    /// Runtime scrape settings derived from `app`.
    pub scrape: ScrapeConfig,
    /// Per-source result cap overriding the board defaults.
    pub max_results: Option<usize>,
    pub context: ExecutionContext,
}

impl RunConfig {
    /// Build a run config. On CI the browser always runs headless without
    /// Chrome's sandbox.
    pub fn new(app: AppConfig, context: ExecutionContext) -> Self {
        let mut scrape = ScrapeConfig::from(&app);
        if context.is_ci() {
            scrape.headless = true;
            scrape.sandbox = false;
        }
        Self {
            app,
            scrape,
            max_results: None,
            context,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn csv_path(&self) -> PathBuf {
        PathBuf::from(&self.app.output.csv_path)
    }

    pub fn report_path(&self) -> PathBuf {
        PathBuf::from(&self.app.output.report_path)
    }

    fn query(&self) -> SearchQuery {
        let query = SearchQuery::new(&self.app.search.position, &self.app.search.country);
        match self.max_results {
            Some(n) => query.with_max_results(n),
            None => query,
        }
    }

    /// Enabled sources in scrape order, with the mode each one uses.
    pub fn enabled_sources(&self) -> Vec<(JobSource, ScrapeMode)> {
        let mut sources = Vec::new();
        if self.app.linkedin.enabled {
            let mode = match self.app.linkedin.mode {
                LinkedInMode::Http => ScrapeMode::Http,
                LinkedInMode::Browser => ScrapeMode::Browser,
            };
            sources.push((JobSource::LinkedIn, mode));
        }
        if self.app.google_careers.enabled {
            sources.push((JobSource::GoogleCareers, ScrapeMode::Http));
        }
        sources
    }
}

/// What one source contributed to a run.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source: JobSource,
    pub mode: ScrapeMode,
    pub collected: usize,
    pub pages: usize,
    pub skipped_cards: usize,
    /// `None` when the source failed before scraping anything.
    pub stop: Option<StopReason>,
    /// Why the source failed outright.
    pub error: Option<String>,
}

impl SourceSummary {
    fn from_outcome(outcome: &ScrapeOutcome, mode: ScrapeMode) -> Self {
        Self {
            source: outcome.source,
            mode,
            collected: outcome.jobs.len(),
            pages: outcome.pages,
            skipped_cards: outcome.skipped_cards,
            stop: Some(outcome.stop),
            error: None,
        }
    }

    fn failed(source: JobSource, mode: ScrapeMode, error: String) -> Self {
        Self {
            source,
            mode,
            collected: 0,
            pages: 0,
            skipped_cards: 0,
            stop: None,
            error: Some(error),
        }
    }

    /// Whether the source ended early (retries exhausted, browser failure, or
    /// outright error).
    pub fn is_degraded(&self) -> bool {
        self.error.is_some() || self.stop.is_some_and(StopReason::is_degraded)
    }
}

/// Result of [`run_collection`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Run identifier (`run_time` at minute precision).
    pub run_id: String,
    pub sources: Vec<SourceSummary>,
    /// Records scraped this run, before dedup against the dataset.
    pub collected: usize,
    /// Links new to the dataset.
    pub added: usize,
    /// Known links whose row changed.
    pub updated: usize,
    /// Dataset size after the merge.
    pub total: usize,
    pub csv_path: PathBuf,
    /// `None` when report rendering was disabled.
    pub report_path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a source is scraped.
    fn source_started(&self, source: JobSource, mode: ScrapeMode);
    /// Called after a source finished or failed.
    fn source_finished(&self, summary: &SourceSummary);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_started(&self, _source: JobSource, _mode: ScrapeMode) {}
    fn source_finished(&self, _summary: &SourceSummary) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run one collection.
///
/// 1. Capture the run timestamp
/// 2. Scrape each enabled source in order (a failing source contributes nothing)
/// 3. Load the dataset, merge, save
/// 4. Render the report (unless disabled)
///
/// Only dataset and report I/O failures abort the run.
#[instrument(skip_all, fields(position = %config.app.search.position, country = %config.app.search.country))]
pub async fn run_collection(
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let run_time = capture_run_time();
    let run_id = format_run_time(run_time);

    info!(%run_id, context = ?config.context, "starting collection run");

    // --- Phase 1: Scrape ---
    let registry = BoardRegistry::from_config(&config.app);
    let scraper = JobScraper::new(config.scrape.clone(), registry)?.with_run_time(run_time);
    let query = config.query();

    let mut batch = Vec::new();
    let mut sources = Vec::new();

    for (source, mode) in config.enabled_sources() {
        progress.phase(&format!("Scraping {source}"));
        progress.source_started(source, mode);

        let summary = match scraper.scrape_source(source, &query, mode).await {
            Ok(outcome) => {
                let summary = SourceSummary::from_outcome(&outcome, mode);
                batch.extend(outcome.jobs);
                summary
            }
            Err(e) => {
                warn!(%source, error = %e, "source failed, continuing without it");
                SourceSummary::failed(source, mode, e.to_string())
            }
        };

        info!(
            %source,
            collected = summary.collected,
            degraded = summary.is_degraded(),
            "source done"
        );
        progress.source_finished(&summary);
        sources.push(summary);
    }

    let collected = batch.len();

    // --- Phase 2: Merge + save ---
    progress.phase("Updating dataset");
    let csv_path = config.csv_path();
    let store = JobStore::new(&csv_path);
    let mut dataset = store.load()?;
    let merge = dataset.merge(batch);
    store.save(&dataset)?;

    // --- Phase 3: Report ---
    let report_path = if config.app.output.render_report {
        progress.phase("Rendering report");
        let path = config.report_path();
        let html = render_report(dataset.records(), &ReportOptions::from_config(&config.app))?;
        write_report(&path, &html)?;
        Some(path)
    } else {
        None
    };

    let summary = RunSummary {
        run_id,
        sources,
        collected,
        added: merge.added,
        updated: merge.updated,
        total: dataset.len(),
        csv_path,
        report_path,
        elapsed: start.elapsed(),
    };

    info!(
        collected = summary.collected,
        added = summary.added,
        updated = summary.updated,
        total = summary.total,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "collection run complete"
    );

    progress.done(&summary);
    Ok(summary)
}

/// Re-render the report from the saved dataset without scraping.
///
/// Returns the number of records rendered.
#[instrument(skip_all, fields(csv = %csv_path.display(), report = %report_path.display()))]
pub fn regenerate_report(csv_path: &Path, report_path: &Path, opts: &ReportOptions) -> Result<usize> {
    let dataset = JobStore::new(csv_path).load()?;
    if dataset.is_empty() {
        warn!("dataset is empty, rendering an empty report");
    }
    let html = render_report(dataset.records(), opts)?;
    write_report(report_path, &html)?;
    Ok(dataset.len())
}

/// Aggregate statistics of the saved dataset.
pub fn summarize(csv_path: &Path, opts: &ReportOptions) -> Result<ReportStats> {
    let dataset = JobStore::new(csv_path).load()?;
    Ok(ReportStats::compute(dataset.records(), opts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EMPTY_PAGE: &str = "<html><body><main></main></body></html>";

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("jt-run-test-{}", Uuid::now_v7()))
    }

    fn run_config(server: &MockServer, dir: &Path) -> RunConfig {
        let mut app = AppConfig::default();
        app.linkedin.base_url = format!("{}/jobs/search", server.uri());
        app.google_careers.base_url =
            format!("{}/about/careers/applications/jobs/results/", server.uri());
        app.output.csv_path = dir.join("jobs.csv").to_string_lossy().into_owned();
        app.output.report_path = dir.join("site").join("jobs_dashboard.html").to_string_lossy().into_owned();

        let mut config = RunConfig::new(app, ExecutionContext::Local);
        config.scrape = ScrapeConfig::without_delays();
        config
    }

    async fn mount_google(server: &MockServer) {
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_PAGE))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about/careers/applications/jobs/results/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("google_careers.html")))
            .mount(server)
            .await;
    }

    async fn mount_linkedin(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("linkedin_search.html")))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_PAGE))
            .mount(server)
            .await;
    }

    /// Records the progress callbacks it receives.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.events.lock().unwrap().push(format!("phase:{name}"));
        }
        fn source_started(&self, source: JobSource, _mode: ScrapeMode) {
            self.events.lock().unwrap().push(format!("start:{source}"));
        }
        fn source_finished(&self, summary: &SourceSummary) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish:{}:{}", summary.source, summary.collected));
        }
        fn done(&self, summary: &RunSummary) {
            self.events.lock().unwrap().push(format!("done:{}", summary.total));
        }
    }

    #[tokio::test]
    async fn full_run_writes_csv_and_report() {
        let server = MockServer::start().await;
        mount_linkedin(&server).await;
        mount_google(&server).await;

        let dir = temp_dir();
        let config = run_config(&server, &dir);
        let progress = RecordingProgress::default();

        let summary = run_collection(&config, &progress).await.unwrap();

        assert_eq!(summary.collected, 5);
        assert_eq!(summary.added, 5);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.sources[0].source, JobSource::LinkedIn);
        assert_eq!(summary.sources[0].collected, 3);
        assert_eq!(summary.sources[0].skipped_cards, 1);
        assert_eq!(summary.sources[1].collected, 2);
        assert!(summary.sources.iter().all(|s| !s.is_degraded()));

        let csv = std::fs::read_to_string(dir.join("jobs.csv")).unwrap();
        assert_eq!(csv.lines().count(), 6);
        assert!(csv.contains(&summary.run_id));

        let report = summary.report_path.as_ref().expect("report rendered");
        let html = std::fs::read_to_string(report).unwrap();
        assert!(html.contains(r#"<strong id="total-jobs">5</strong>"#));
        assert!(html.contains("Acme Analytics"));

        let events = progress.events.lock().unwrap().clone();
        assert_eq!(events.first().map(String::as_str), Some("phase:Scraping LinkedIn"));
        assert!(events.contains(&"finish:Google Careers:2".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("done:5"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn repeated_run_adds_nothing() {
        let server = MockServer::start().await;
        mount_linkedin(&server).await;
        mount_google(&server).await;

        let dir = temp_dir();
        let config = run_config(&server, &dir);

        run_collection(&config, &SilentProgress).await.unwrap();
        let second = run_collection(&config, &SilentProgress).await.unwrap();

        assert_eq!(second.collected, 5);
        assert_eq!(second.added, 0);
        assert_eq!(second.total, 5);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rate_limited_source_degrades_without_failing_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;
        mount_google(&server).await;

        let dir = temp_dir();
        let mut config = run_config(&server, &dir);
        config.app.output.render_report = false;

        let summary = run_collection(&config, &SilentProgress).await.unwrap();

        assert_eq!(summary.sources[0].collected, 0);
        assert_eq!(summary.sources[0].stop, Some(StopReason::RetriesExhausted));
        assert!(summary.sources[0].is_degraded());
        assert_eq!(summary.total, 2);
        assert!(summary.report_path.is_none());
        assert!(!dir.join("site").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn disabled_sources_are_not_requested() {
        let server = MockServer::start().await;
        mount_google(&server).await;

        let dir = temp_dir();
        let mut config = run_config(&server, &dir);
        config.app.linkedin.enabled = false;

        let summary = run_collection(&config, &SilentProgress).await.unwrap();
        assert_eq!(summary.sources.len(), 1);
        assert_eq!(summary.sources[0].source, JobSource::GoogleCareers);

        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.url.path() != "/jobs/search"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn regenerate_and_summarize_from_saved_csv() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let csv = dir.join("jobs.csv");
        std::fs::write(
            &csv,
            "title,company,location,link,source,job_id,run_time\n\
             Data Scientist,Acme,Israel,https://il.linkedin.com/jobs/view/1,LinkedIn,1,2025-05-01 08:00\n\
             Data Analyst,Acme,Israel,https://il.linkedin.com/jobs/view/2,LinkedIn,2,2025-05-01 20:00\n\
             Research Scientist,Google,Tel Aviv,https://www.google.com/about/careers/applications/jobs/results/3-rs,Google Careers,3,2025-05-01 20:00\n",
        )
        .unwrap();

        let report = dir.join("out").join("report.html");
        let opts = ReportOptions::default();
        let rendered = regenerate_report(&csv, &report, &opts).unwrap();
        assert_eq!(rendered, 3);
        assert!(std::fs::read_to_string(&report).unwrap().contains("Last run: 2025-05-01 20:00"));

        let stats = summarize(&csv, &opts).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.runs.len(), 2);
        assert_eq!(stats.top_companies[0], ("Acme".to_string(), 2));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn ci_context_forces_headless_without_sandbox() {
        let mut app = AppConfig::default();
        app.browser.headless = false;
        app.linkedin.mode = LinkedInMode::Browser;

        let local = RunConfig::new(app.clone(), ExecutionContext::Local);
        assert!(!local.scrape.headless);
        assert!(local.scrape.sandbox);

        let ci = RunConfig::new(app, ExecutionContext::Ci);
        assert!(ci.scrape.headless);
        assert!(!ci.scrape.sandbox);
        assert_eq!(
            ci.enabled_sources(),
            vec![
                (JobSource::LinkedIn, ScrapeMode::Browser),
                (JobSource::GoogleCareers, ScrapeMode::Http)
            ]
        );
    }
}
