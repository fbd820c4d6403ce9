//! Aggregates shown on the dashboard.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use jobtracker_shared::{AppConfig, JobRecord, JobSource, ReportConfig, format_run_time};
use regex::Regex;
use serde::Serialize;

/// Knobs for [`ReportStats::compute`] and the rendered page.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub top_companies: usize,
    pub top_keywords: usize,
    pub latest_count: usize,
    /// Lowercase words excluded from the keyword ranking.
    pub stop_words: HashSet<String>,
}

impl ReportOptions {
    /// Options from the `[report]` section, titled after the configured search.
    pub fn from_config(config: &AppConfig) -> Self {
        let title = config.report.title.clone().unwrap_or_else(|| {
            format!(
                "{} Jobs in {}",
                config.search.position, config.search.country
            )
        });
        Self::with_title(title, &config.report)
    }

    pub fn with_title(title: impl Into<String>, report: &ReportConfig) -> Self {
        Self {
            title: title.into(),
            top_companies: report.top_companies,
            top_keywords: report.top_keywords,
            latest_count: report.latest_count,
            stop_words: report
                .stop_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Number of records captured by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunCount {
    pub run_time: NaiveDateTime,
    pub count: usize,
}

impl RunCount {
    pub fn run_id(&self) -> String {
        format_run_time(self.run_time)
    }
}

/// Everything the report needs, computed once from the dataset.
#[derive(Debug, Clone)]
pub struct ReportStats {
    pub total: usize,
    /// Jobs per run, oldest run first.
    pub runs: Vec<RunCount>,
    /// Most frequent companies, highest count first.
    pub top_companies: Vec<(String, usize)>,
    /// Records per source, highest count first.
    pub sources: Vec<(JobSource, usize)>,
    /// Most frequent title words, stop words excluded.
    pub keywords: Vec<(String, usize)>,
    /// Most recently captured records.
    pub latest: Vec<JobRecord>,
    pub last_run_id: Option<String>,
}

impl ReportStats {
    pub fn compute(records: &[JobRecord], opts: &ReportOptions) -> Self {
        let mut per_run: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
        for t in records.iter().filter_map(|r| r.run_time) {
            *per_run.entry(t).or_default() += 1;
        }
        let runs: Vec<RunCount> = per_run
            .into_iter()
            .map(|(run_time, count)| RunCount { run_time, count })
            .collect();
        let last_run_id = runs.last().map(RunCount::run_id);

        let top_companies = rank(
            records
                .iter()
                .map(|r| r.company.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            opts.top_companies,
        );

        let mut source_counts: HashMap<JobSource, usize> = HashMap::new();
        for r in records {
            *source_counts.entry(r.source).or_default() += 1;
        }
        let mut sources: Vec<(JobSource, usize)> = source_counts.into_iter().collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let keywords = rank(
            records
                .iter()
                .flat_map(|r| title_words(&r.title))
                .filter(|w| !opts.stop_words.contains(w)),
            opts.top_keywords,
        );

        let mut latest: Vec<JobRecord> = records.to_vec();
        // Stable: equal run times keep dataset order. Undated rows go last.
        latest.sort_by(|a, b| b.run_time.cmp(&a.run_time));
        latest.truncate(opts.latest_count);

        Self {
            total: records.len(),
            runs,
            top_companies,
            sources,
            keywords,
            latest,
            last_run_id,
        }
    }
}

/// Lowercase words of four or more ASCII letters.
pub fn title_words(title: &str) -> Vec<String> {
    static WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b[a-z]{4,}\b").expect("valid regex"));

    let lower = title.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Count occurrences and keep the `n` most frequent. Ties sort alphabetically.
fn rank(items: impl Iterator<Item = String>, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}
