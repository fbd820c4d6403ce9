//! Job scraping engine.
//!
//! Drives one board at a time: either page-by-page over HTTP with retry and
//! randomized pacing, or through a headless browser that scrolls the result
//! list until it stops growing. Failures degrade to whatever was collected.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use jobtracker_shared::{
    JobRecord, JobSource, JobTrackerError, Result, ScrapeConfig, capture_run_time,
};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::boards::{BoardParser, BoardRegistry, ParseContext, SearchQuery, parse_html};
use crate::browser::{BrowserOptions, BrowserSession};
use crate::client::{build_client, random_user_agent};
use crate::retry::{RetryPolicy, fetch_with_retry, random_between};
use crate::scroll::{ScrollPolicy, collect_until_stable};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Why a scrape of one source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A result page had no job cards.
    EmptyPage,
    /// A page (or scroll round) added no links not already seen.
    NoNewResults,
    /// The result cap was reached.
    LimitReached,
    /// As many records as the board reported were collected.
    TotalReached,
    /// The page or scroll-attempt bound was hit.
    PageLimit,
    /// A page kept failing; results are partial.
    RetriesExhausted,
    /// The browser session failed mid-scrape; results are partial.
    SessionError,
}

impl StopReason {
    /// Whether the scrape ended early because of a failure.
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::RetriesExhausted | Self::SessionError)
    }
}

/// How a source is scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrapeMode {
    /// Paginated HTTP requests.
    #[default]
    Http,
    /// Headless browser with infinite scroll.
    Browser,
}

/// Summary of scraping one source.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub source: JobSource,
    /// Unique records in first-seen order.
    pub jobs: Vec<JobRecord>,
    /// Pages fetched (HTTP) or scroll rounds read (browser).
    pub pages: usize,
    /// Cards dropped for missing required fields.
    pub skipped_cards: usize,
    /// Total advertised by the board, when it shows one.
    pub total_reported: Option<usize>,
    pub stop: StopReason,
}

// ---------------------------------------------------------------------------
// JobScraper
// ---------------------------------------------------------------------------

/// Scrapes job boards for one run. All records share the run's timestamp.
pub struct JobScraper {
    config: ScrapeConfig,
    client: Client,
    user_agent: &'static str,
    registry: BoardRegistry,
    run_time: NaiveDateTime,
}

impl JobScraper {
    /// Create a scraper with a fresh client and a randomly chosen User-Agent.
    pub fn new(config: ScrapeConfig, registry: BoardRegistry) -> Result<Self> {
        let user_agent = random_user_agent();
        let client = build_client(config.timeout, user_agent)?;
        debug!(user_agent, "scraper client ready");

        Ok(Self {
            config,
            client,
            user_agent,
            registry,
            run_time: capture_run_time(),
        })
    }

    /// Stamp records with `run_time` instead of the time of construction.
    pub fn with_run_time(mut self, run_time: NaiveDateTime) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn run_time(&self) -> NaiveDateTime {
        self.run_time
    }

    /// Paginated HTTP scrape of the board serving `website`.
    ///
    /// An unsupported website yields no records rather than an error.
    pub async fn scrape(&self, website: &str, query: &SearchQuery) -> Result<Vec<JobRecord>> {
        self.scrape_website(website, query, ScrapeMode::Http).await
    }

    /// Browser-mode scrape of the board serving `website`.
    pub async fn scrape_scrolling(
        &self,
        website: &str,
        query: &SearchQuery,
    ) -> Result<Vec<JobRecord>> {
        self.scrape_website(website, query, ScrapeMode::Browser)
            .await
    }

    async fn scrape_website(
        &self,
        website: &str,
        query: &SearchQuery,
        mode: ScrapeMode,
    ) -> Result<Vec<JobRecord>> {
        match self.registry.find(website) {
            Some(board) => Ok(self.scrape_board(board, query, mode).await?.jobs),
            None => {
                warn!(website, "no board registered for website, skipping");
                Ok(Vec::new())
            }
        }
    }

    /// Scrape one source in the given mode.
    pub async fn scrape_source(
        &self,
        source: JobSource,
        query: &SearchQuery,
        mode: ScrapeMode,
    ) -> Result<ScrapeOutcome> {
        let board = self.registry.get(source).ok_or_else(|| {
            JobTrackerError::config(format!("no board registered for {source}"))
        })?;
        self.scrape_board(board, query, mode).await
    }

    async fn scrape_board(
        &self,
        board: Arc<dyn BoardParser>,
        query: &SearchQuery,
        mode: ScrapeMode,
    ) -> Result<ScrapeOutcome> {
        match mode {
            ScrapeMode::Http => self.paginate(board, query).await,
            ScrapeMode::Browser => self.scroll(board, query).await,
        }
    }

    #[instrument(skip_all, fields(source = %board.source(), position = %query.position))]
    async fn paginate(
        &self,
        board: Arc<dyn BoardParser>,
        query: &SearchQuery,
    ) -> Result<ScrapeOutcome> {
        let limit = query.max_results.unwrap_or_else(|| board.max_results());
        let policy = RetryPolicy::from(&self.config);
        let max_pages = self.config.max_pages as usize;

        let mut seen: HashSet<String> = HashSet::new();
        let mut jobs: Vec<JobRecord> = Vec::new();
        let mut pages = 0usize;
        let mut skipped_cards = 0usize;
        let mut total_reported: Option<usize> = None;
        let mut stop = StopReason::PageLimit;

        info!(limit, max_pages, "starting paginated scrape");

        for page_index in 0..max_pages {
            let url = board.search_url(query, page_index)?;

            let body = match fetch_with_retry(&self.client, &url, &policy).await {
                Ok(body) => body,
                Err(e) if e.is_retries_exhausted() => {
                    warn!(page = page_index + 1, collected = jobs.len(), error = %e, "giving up on source, keeping results so far");
                    stop = StopReason::RetriesExhausted;
                    break;
                }
                Err(e) => return Err(e),
            };
            pages += 1;

            let ctx = ParseContext {
                page_url: &url,
                run_time: self.run_time,
                fallback_location: &query.country,
            };
            let page = parse_html(board.as_ref(), &body, &ctx);

            skipped_cards += page.skipped;
            if total_reported.is_none() {
                total_reported = page.total_results;
            }

            if page.jobs.is_empty() {
                debug!(page = page_index + 1, "no job cards on page");
                stop = StopReason::EmptyPage;
                break;
            }

            let before = jobs.len();
            for job in page.jobs {
                if seen.insert(job.link.clone()) {
                    jobs.push(job);
                }
            }
            let added = jobs.len() - before;
            info!(page = page_index + 1, added, collected = jobs.len(), skipped = page.skipped, "page scraped");

            if added == 0 {
                stop = StopReason::NoNewResults;
                break;
            }
            if jobs.len() >= limit {
                stop = StopReason::LimitReached;
                break;
            }
            if total_reported.is_some_and(|total| jobs.len() >= total) {
                stop = StopReason::TotalReached;
                break;
            }

            if page_index + 1 < max_pages {
                let delay = random_between(self.config.page_delay_min, self.config.page_delay_max);
                if !delay.is_zero() {
                    debug!(delay_ms = delay.as_millis() as u64, "pausing before next page");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        jobs.truncate(limit);
        info!(collected = jobs.len(), pages, skipped_cards, stop = ?stop, "source scrape finished");

        Ok(ScrapeOutcome {
            source: board.source(),
            jobs,
            pages,
            skipped_cards,
            total_reported,
            stop,
        })
    }

    #[instrument(skip_all, fields(source = %board.source(), position = %query.position))]
    async fn scroll(
        &self,
        board: Arc<dyn BoardParser>,
        query: &SearchQuery,
    ) -> Result<ScrapeOutcome> {
        let url = board.search_url(query, 0)?;
        let limit = query.max_results.unwrap_or_else(|| board.max_results());
        let options = BrowserOptions::from_config(&self.config, self.user_agent);
        let policy = ScrollPolicy::from(&self.config);
        let run_time = self.run_time;
        let fallback_location = query.country.clone();
        let source = board.source();

        info!(%url, limit, headless = options.headless, "starting browser scrape");

        // The browser API is blocking; keep it off the async workers.
        let outcome = tokio::task::spawn_blocking(move || -> Result<_> {
            let session = BrowserSession::launch(&options)?;
            session.open(&url)?;
            Ok(collect_until_stable(&session, &policy, limit, |html| {
                let ctx = ParseContext {
                    page_url: &url,
                    run_time,
                    fallback_location: &fallback_location,
                };
                parse_html(board.as_ref(), html, &ctx).jobs
            }))
        })
        .await
        .map_err(|e| JobTrackerError::Browser(format!("browser task failed: {e}")))??;

        Ok(ScrapeOutcome {
            source,
            jobs: outcome.jobs,
            pages: outcome.attempts as usize,
            skipped_cards: 0,
            total_reported: None,
            stop: outcome.stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use jobtracker_shared::AppConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn linkedin_page(ids: std::ops::Range<u32>, total: Option<usize>) -> String {
        let mut html = String::from("<html><body>");
        if let Some(total) = total {
            html.push_str(&format!(
                r#"<span class="results-context-header__job-count">{total}</span>"#
            ));
        }
        html.push_str("<ul>");
        for id in ids {
            html.push_str(&format!(
                r#"<li><div class="base-card" data-entity-urn="urn:li:jobPosting:{id}">
                   <a class="base-card__full-link" href="https://il.linkedin.com/jobs/view/job-{id}?trk=x"></a>
                   <h3 class="base-search-card__title">Data Scientist {id}</h3>
                   <h4 class="base-search-card__subtitle">Company {id}</h4>
                   <span class="job-search-card__location">Tel Aviv, Israel</span>
                   </div></li>"#
            ));
        }
        html.push_str("</ul></body></html>");
        html
    }

    fn registry_for(server: &MockServer) -> BoardRegistry {
        let mut config = AppConfig::default();
        config.linkedin.base_url = format!("{}/jobs/search", server.uri());
        config.google_careers.base_url =
            format!("{}/about/careers/applications/jobs/results/", server.uri());
        BoardRegistry::from_config(&config)
    }

    fn run_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn scraper(server: &MockServer) -> JobScraper {
        JobScraper::new(ScrapeConfig::without_delays(), registry_for(server))
            .unwrap()
            .with_run_time(run_time())
    }

    async fn mount_linkedin(server: &MockServer, start: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .and(query_param("start", start))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn query() -> SearchQuery {
        SearchQuery::new("Data Scientist", "Israel")
    }

    #[tokio::test]
    async fn paginates_until_empty_page() {
        let server = MockServer::start().await;
        mount_linkedin(&server, "0", linkedin_page(0..25, None)).await;
        mount_linkedin(&server, "25", linkedin_page(25..35, None)).await;
        mount_linkedin(&server, "50", linkedin_page(0..0, None)).await;

        let outcome = scraper(&server)
            .scrape_source(JobSource::LinkedIn, &query(), ScrapeMode::Http)
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 35);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.stop, StopReason::EmptyPage);
        assert_eq!(outcome.jobs[0].link, "https://il.linkedin.com/jobs/view/job-0");
        assert_eq!(outcome.jobs[0].job_id, "0");
        assert_eq!(outcome.jobs[34].run_time, Some(run_time()));
    }

    #[tokio::test]
    async fn stops_when_page_adds_nothing_new() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(linkedin_page(0..5, None)))
            .expect(2)
            .mount(&server)
            .await;

        let outcome = scraper(&server)
            .scrape_source(JobSource::LinkedIn, &query(), ScrapeMode::Http)
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 5);
        assert_eq!(outcome.stop, StopReason::NoNewResults);
    }

    #[tokio::test]
    async fn truncates_to_max_results() {
        let server = MockServer::start().await;
        mount_linkedin(&server, "0", linkedin_page(0..25, None)).await;
        mount_linkedin(&server, "25", linkedin_page(25..50, None)).await;

        let outcome = scraper(&server)
            .scrape_source(
                JobSource::LinkedIn,
                &query().with_max_results(30),
                ScrapeMode::Http,
            )
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 30);
        assert_eq!(outcome.stop, StopReason::LimitReached);
        assert_eq!(outcome.jobs[29].job_id, "29");
    }

    #[tokio::test]
    async fn stops_at_reported_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(linkedin_page(0..12, Some(12))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = scraper(&server)
            .scrape_source(JobSource::LinkedIn, &query(), ScrapeMode::Http)
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 12);
        assert_eq!(outcome.total_reported, Some(12));
        assert_eq!(outcome.stop, StopReason::TotalReached);
    }

    #[tokio::test]
    async fn persistent_rate_limit_yields_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let outcome = scraper(&server)
            .scrape_source(JobSource::LinkedIn, &query(), ScrapeMode::Http)
            .await
            .unwrap();

        assert!(outcome.jobs.is_empty());
        assert_eq!(outcome.stop, StopReason::RetriesExhausted);
        assert!(outcome.stop.is_degraded());
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), ScrapeConfig::without_delays().max_retries as usize);
    }

    #[tokio::test]
    async fn failing_later_page_keeps_earlier_results() {
        let server = MockServer::start().await;
        mount_linkedin(&server, "0", linkedin_page(0..25, None)).await;
        Mock::given(method("GET"))
            .and(query_param("start", "25"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let outcome = scraper(&server)
            .scrape_source(JobSource::LinkedIn, &query(), ScrapeMode::Http)
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 25);
        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.stop, StopReason::RetriesExhausted);
        assert_eq!(server.received_requests().await.unwrap().len(), 1 + 3);
    }

    #[tokio::test]
    async fn scrapes_google_careers_by_website() {
        let server = MockServer::start().await;
        let fixture = std::fs::read_to_string("../../../fixtures/html/google_careers.html")
            .expect("missing fixture");

        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about/careers/applications/jobs/results/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture))
            .mount(&server)
            .await;

        let jobs = scraper(&server)
            .scrape("google.com/about/careers", &query())
            .await
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.company == "Google"));
        assert!(jobs.iter().all(|j| j.source == JobSource::GoogleCareers));
        assert_eq!(
            jobs[0].link,
            format!(
                "{}/about/careers/applications/jobs/results/1234567890-data-scientist-research",
                server.uri()
            )
        );
        assert_eq!(jobs[0].job_id, "1234567890");
        assert_eq!(jobs[1].location, "Israel");
    }

    #[tokio::test]
    async fn unknown_website_is_empty_not_error() {
        let server = MockServer::start().await;
        let jobs = scraper(&server).scrape("indeed.com", &query()).await.unwrap();
        assert!(jobs.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
