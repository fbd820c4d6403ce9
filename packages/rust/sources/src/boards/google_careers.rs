//! Google Careers results board.

use jobtracker_shared::{
    GoogleCareersConfig, JobRecord, JobSource, JobTrackerError, Result, resolve_web_link,
};
use scraper::{ElementRef, Html};
use url::Url;

use super::{BoardParser, ParseContext, ParsedPage, SearchQuery, SelectorChain};

/// Every posting on this board belongs to the same employer.
const COMPANY: &str = "Google";

/// Scrapes `google.com/about/careers/applications/jobs/results/`.
pub struct GoogleCareersParser {
    base_url: String,
    max_results: usize,
    cards: SelectorChain,
    title: SelectorChain,
    location: SelectorChain,
    link: SelectorChain,
}

impl GoogleCareersParser {
    pub fn new(config: &GoogleCareersConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            max_results: config.max_results,
            cards: SelectorChain::new(&["li.lLd3Je", "ul.spHGqe > li"]),
            title: SelectorChain::new(&["h3.QJPWVe", "h3"]),
            location: SelectorChain::new(&["div.vbZS6e", "span.r0wTof", "span.pwO9Dc"]),
            link: SelectorChain::new(&["a.WpHeLc", r#"a[href*="jobs/results/"]"#]),
        }
    }

    fn parse_card(
        &self,
        card: ElementRef<'_>,
        link_root: &Url,
        ctx: &ParseContext<'_>,
    ) -> Option<JobRecord> {
        let title = self.title.text(card)?;
        let href = self.link.attr(card, "href")?;
        let link = resolve_web_link(link_root, &href)?;
        let location = self
            .location
            .text(card)
            .unwrap_or_else(|| ctx.fallback_location.to_string());
        let job_id = job_id_from_link(&link).unwrap_or_default();

        Some(JobRecord {
            title,
            company: COMPANY.to_string(),
            location,
            link,
            source: JobSource::GoogleCareers,
            job_id,
            run_time: Some(ctx.run_time),
        })
    }
}

impl BoardParser for GoogleCareersParser {
    fn source(&self) -> JobSource {
        JobSource::GoogleCareers
    }

    fn matches(&self, website: &str) -> bool {
        website.contains("google.com")
    }

    fn search_url(&self, query: &SearchQuery, page_index: usize) -> Result<Url> {
        let quoted = format!("'{}'", query.position);
        let page = (page_index + 1).to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("q", quoted.as_str()),
            ("location", query.country.as_str()),
        ];
        if page_index > 0 {
            params.push(("page", page.as_str()));
        }

        Url::parse_with_params(&self.base_url, &params).map_err(|e| {
            JobTrackerError::config(format!(
                "invalid google_careers base_url '{}': {e}",
                self.base_url
            ))
        })
    }

    fn parse(&self, doc: &Html, ctx: &ParseContext<'_>) -> ParsedPage {
        let link_root = applications_root(ctx.page_url);

        let mut page = ParsedPage::default();
        for card in self.cards.select_all(doc) {
            match self.parse_card(card, &link_root, ctx) {
                Some(job) => page.jobs.push(job),
                None => page.skipped += 1,
            }
        }
        page
    }

    fn max_results(&self) -> usize {
        self.max_results
    }
}

/// Result hrefs are relative to the `applications/` root, two levels up from
/// `jobs/results/`. The results path may be configured with or without a
/// trailing slash.
fn applications_root(page_url: &Url) -> Url {
    let mut results = page_url.clone();
    if !results.path().ends_with('/') {
        let path = format!("{}/", results.path());
        results.set_path(&path);
    }
    results.join("../../").unwrap_or(results)
}

/// Result links end in `<numeric id>-<slug>`.
fn job_id_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let last = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let id: String = last.chars().take_while(char::is_ascii_digit).collect();
    (!id.is_empty()).then_some(id)
}
