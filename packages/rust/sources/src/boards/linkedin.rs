//! LinkedIn public job search board.

use jobtracker_shared::{
    JobRecord, JobSource, JobTrackerError, LinkedInConfig, Result, resolve_web_link,
};
use scraper::{ElementRef, Html};
use url::Url;

use super::{BoardParser, ParseContext, ParsedPage, SearchQuery, SelectorChain, parse_count};

/// Tracking parameter LinkedIn's own search bar sends.
const SEARCH_TRK: &str = "public_jobs_jobs-search-bar_search-submit";

/// Scrapes the guest (logged-out) LinkedIn job search results.
pub struct LinkedInParser {
    base_url: String,
    geo_id: String,
    posted_within: String,
    page_size: usize,
    max_results: usize,
    cards: SelectorChain,
    title: SelectorChain,
    company: SelectorChain,
    location: SelectorChain,
    link: SelectorChain,
    urn: SelectorChain,
    total: SelectorChain,
}

impl LinkedInParser {
    pub fn new(config: &LinkedInConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            geo_id: config.geo_id.clone(),
            posted_within: config.posted_within.clone(),
            page_size: config.page_size.max(1),
            max_results: config.max_results,
            cards: SelectorChain::new(&[
                "div.base-card",
                "div.base-search-card",
                "div.job-search-card",
            ]),
            title: SelectorChain::new(&[
                "h3.base-search-card__title",
                "h3.job-search-card__title",
                "h3",
            ]),
            company: SelectorChain::new(&[
                "h4.base-search-card__subtitle",
                "a.hidden-nested-link",
                "h4",
            ]),
            location: SelectorChain::new(&[
                "span.job-search-card__location",
                "div.base-search-card__metadata span",
            ]),
            link: SelectorChain::new(&[
                "a.base-card__full-link",
                "a.base-search-card--link",
                r#"a[href*="/jobs/view/"]"#,
            ]),
            urn: SelectorChain::new(&["[data-entity-urn]"]),
            total: SelectorChain::new(&[
                "span.results-context-header__job-count",
                "h1.results-context-header__context span",
            ]),
        }
    }

    fn parse_card(&self, card: ElementRef<'_>, ctx: &ParseContext<'_>) -> Option<JobRecord> {
        let title = self.title.text(card)?;
        let company = self.company.text(card)?;
        let href = self.link.attr(card, "href")?;
        let link = resolve_web_link(ctx.page_url, &href)?;
        let location = self
            .location
            .text(card)
            .unwrap_or_else(|| ctx.fallback_location.to_string());

        let job_id = card
            .value()
            .attr("data-entity-urn")
            .map(String::from)
            .or_else(|| self.urn.attr(card, "data-entity-urn"))
            .and_then(|urn| urn.rsplit(':').next().map(str::to_string))
            .filter(|id| !id.is_empty())
            .or_else(|| card.value().attr("data-job-id").map(String::from))
            .or_else(|| job_id_from_link(&link))
            .unwrap_or_default();

        Some(JobRecord {
            title,
            company,
            location,
            link,
            source: JobSource::LinkedIn,
            job_id,
            run_time: Some(ctx.run_time),
        })
    }
}

impl BoardParser for LinkedInParser {
    fn source(&self) -> JobSource {
        JobSource::LinkedIn
    }

    fn matches(&self, website: &str) -> bool {
        website.contains("linkedin.com")
    }

    fn search_url(&self, query: &SearchQuery, page_index: usize) -> Result<Url> {
        let start = (page_index * self.page_size).to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("keywords", query.position.as_str()),
            ("location", query.country.as_str()),
            ("geoId", self.geo_id.as_str()),
            ("trk", SEARCH_TRK),
            ("position", "1"),
            ("pageNum", "0"),
        ];
        if !self.posted_within.is_empty() {
            params.push(("f_TPR", self.posted_within.as_str()));
        }
        params.push(("start", start.as_str()));

        Url::parse_with_params(&self.base_url, &params).map_err(|e| {
            JobTrackerError::config(format!("invalid linkedin base_url '{}': {e}", self.base_url))
        })
    }

    fn parse(&self, doc: &Html, ctx: &ParseContext<'_>) -> ParsedPage {
        let total_results = self.total.document_text(doc).and_then(|t| parse_count(&t));

        let mut page = ParsedPage {
            total_results,
            ..ParsedPage::default()
        };

        for card in self.cards.select_all(doc) {
            match self.parse_card(card, ctx) {
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

/// LinkedIn view links end in `<slug>-<numeric id>`.
fn job_id_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let last = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let id = last.rsplit('-').next()?;
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}
