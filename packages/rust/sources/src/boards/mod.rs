//! Board parser trait and the built-in job boards.
//!
//! Each board knows how to build its search URL for a given result page and
//! how to pull job cards out of the returned HTML. Field extraction goes
//! through [`SelectorChain`]s so a markup change on the board only needs a
//! new selector appended to the chain.

mod google_careers;
mod linkedin;

use std::sync::Arc;

use chrono::NaiveDateTime;
use jobtracker_shared::{AppConfig, JobRecord, JobSource, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

pub use google_careers::GoogleCareersParser;
pub use linkedin::LinkedInParser;

// ---------------------------------------------------------------------------
// Query / parse types
// ---------------------------------------------------------------------------

/// What to search for on a board.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Position keywords (e.g. "Data Scientist").
    pub position: String,
    /// Country or region filter.
    pub country: String,
    /// Overrides the board's configured result cap.
    pub max_results: Option<usize>,
}

impl SearchQuery {
    pub fn new(position: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            country: country.into(),
            max_results: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Per-page context handed to [`BoardParser::parse`].
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// URL the HTML was loaded from, used to resolve relative links.
    pub page_url: &'a Url,
    /// Timestamp stamped on every record of this run.
    pub run_time: NaiveDateTime,
    /// Location used when a card has none.
    pub fallback_location: &'a str,
}

/// Records extracted from one result page.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub jobs: Vec<JobRecord>,
    /// Cards that were found but lacked a required field.
    pub skipped: usize,
    /// Total result count advertised by the board, if shown.
    pub total_results: Option<usize>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A job board: search URL construction plus HTML card extraction.
pub trait BoardParser: Send + Sync {
    /// Which source the extracted records are tagged with.
    fn source(&self) -> JobSource;

    /// Whether this board handles the given website (e.g. `"linkedin.com"`).
    fn matches(&self, website: &str) -> bool;

    /// Build the search URL for the zero-based result page `page_index`.
    fn search_url(&self, query: &SearchQuery, page_index: usize) -> Result<Url>;

    /// Extract job records from a parsed result page.
    fn parse(&self, doc: &Html, ctx: &ParseContext<'_>) -> ParsedPage;

    /// Default cap on collected records for one run.
    fn max_results(&self) -> usize;
}

/// Parse raw HTML with the given board. Keeps the non-`Send` DOM local.
pub fn parse_html(parser: &dyn BoardParser, html: &str, ctx: &ParseContext<'_>) -> ParsedPage {
    let doc = Html::parse_document(html);
    parser.parse(&doc, ctx)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the configured boards in scrape order.
#[derive(Clone)]
pub struct BoardRegistry {
    boards: Vec<Arc<dyn BoardParser>>,
}

impl BoardRegistry {
    /// Registry with both built-in boards on their default settings.
    pub fn new() -> Self {
        Self::from_config(&AppConfig::default())
    }

    /// Registry with both built-in boards configured from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            boards: vec![
                Arc::new(LinkedInParser::new(&config.linkedin)),
                Arc::new(GoogleCareersParser::new(&config.google_careers)),
            ],
        }
    }

    /// Find the board for a website string such as `"linkedin.com"`.
    pub fn find(&self, website: &str) -> Option<Arc<dyn BoardParser>> {
        let website = website.trim().to_lowercase();
        self.boards.iter().find(|b| b.matches(&website)).cloned()
    }

    /// Look up the board producing records for `source`.
    pub fn get(&self, source: JobSource) -> Option<Arc<dyn BoardParser>> {
        self.boards.iter().find(|b| b.source() == source).cloned()
    }
}

impl Default for BoardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Selector chains
// ---------------------------------------------------------------------------

/// Ordered CSS selector fallbacks for one field. The first selector that
/// yields a non-empty value wins.
pub(crate) struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    pub(crate) fn new(sources: &[&str]) -> Self {
        let selectors = sources
            .iter()
            .filter_map(|s| match Selector::parse(s) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    warn!(selector = *s, error = %e, "invalid selector dropped from chain");
                    None
                }
            })
            .collect();
        Self { selectors }
    }

    /// All matches of the first selector that matches anything in the document.
    pub(crate) fn select_all<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        for sel in &self.selectors {
            let found: Vec<_> = doc.select(sel).collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Whitespace-normalized text of the first non-empty match under `el`.
    pub(crate) fn text(&self, el: ElementRef<'_>) -> Option<String> {
        self.selectors
            .iter()
            .flat_map(|sel| el.select(sel))
            .map(|found| collapse_whitespace(&found.text().collect::<String>()))
            .find(|text| !text.is_empty())
    }

    /// Text of the first non-empty match in the whole document.
    pub(crate) fn document_text(&self, doc: &Html) -> Option<String> {
        self.selectors
            .iter()
            .flat_map(|sel| doc.select(sel))
            .map(|found| collapse_whitespace(&found.text().collect::<String>()))
            .find(|text| !text.is_empty())
    }

    /// First non-empty `attr` value among matches under `el`.
    pub(crate) fn attr(&self, el: ElementRef<'_>, attr: &str) -> Option<String> {
        self.selectors
            .iter()
            .flat_map(|sel| el.select(sel))
            .filter_map(|found| found.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(String::from)
    }
}

/// Collapse runs of whitespace (including newlines from card markup) to single spaces.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a result-count label such as `"1,234"` or `"500+"`.
pub(crate) fn parse_count(label: &str) -> Option<usize> {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
