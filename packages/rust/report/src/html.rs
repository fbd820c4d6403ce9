//! Self-contained HTML dashboard.
//!
//! Bootstrap and Plotly load from their CDNs; everything else (chart specs,
//! listings, the table sort script) is inlined so the file can be opened
//! straight from disk or published as a static page. Markup lives in
//! `templates/report.html`.

use askama::Template;
use chrono::{Local, NaiveDateTime};
use jobtracker_shared::{JobRecord, JobTrackerError, Result, format_run_time, is_web_link};
use serde_json::Value;

use crate::charts::{companies_figure, keywords_figure, runs_figure, sources_figure};
use crate::stats::{ReportOptions, ReportStats};

#[derive(Template)]
#[template(path = "report.html")]
struct ReportPage<'a> {
    title: &'a str,
    total: usize,
    updated: String,
    last_run: &'a str,
    latest: Vec<JobRow<'a>>,
    rows: Vec<JobRow<'a>>,
    plots: Vec<Plot>,
}

/// One listing as shown in the accordion and the table.
struct JobRow<'a> {
    title: &'a str,
    company: &'a str,
    location: &'a str,
    source: &'static str,
    scraped: String,
    /// Sortable timestamp; empty when unknown.
    sort_key: String,
    /// `None` for anything but an `http`/`https` link.
    link: Option<&'a str>,
}

impl<'a> JobRow<'a> {
    fn new(job: &'a JobRecord) -> Self {
        let sort_key = job.run_time.map(format_run_time).unwrap_or_default();
        Self {
            title: &job.title,
            company: &job.company,
            location: &job.location,
            source: job.source.label(),
            scraped: if sort_key.is_empty() {
                "N/A".to_string()
            } else {
                sort_key.clone()
            },
            sort_key,
            link: is_web_link(&job.link).then_some(job.link.as_str()),
        }
    }
}

/// A `Plotly.newPlot` target with its figure pre-serialized for a `<script>`.
struct Plot {
    id: &'static str,
    data: String,
    layout: String,
}

impl Plot {
    fn new(id: &'static str, figure: &Value) -> Self {
        Self {
            id,
            data: script_json(&figure["data"]),
            layout: script_json(&figure["layout"]),
        }
    }
}

/// Render the dashboard for `records`, stamped with the current local time.
pub fn render_report(records: &[JobRecord], opts: &ReportOptions) -> Result<String> {
    render_report_at(records, opts, Local::now().naive_local())
}

/// Render the dashboard with an explicit generation time.
pub fn render_report_at(
    records: &[JobRecord],
    opts: &ReportOptions,
    generated_at: NaiveDateTime,
) -> Result<String> {
    let stats = ReportStats::compute(records, opts);

    let mut rows: Vec<&JobRecord> = records.iter().collect();
    rows.sort_by(|a, b| b.run_time.cmp(&a.run_time));

    let page = ReportPage {
        title: &opts.title,
        total: stats.total,
        updated: format_run_time(generated_at),
        last_run: stats.last_run_id.as_deref().unwrap_or("never"),
        latest: stats.latest.iter().map(JobRow::new).collect(),
        rows: rows.into_iter().map(JobRow::new).collect(),
        plots: vec![
            Plot::new("time-series-chart", &runs_figure(&stats)),
            Plot::new("companies-chart", &companies_figure(&stats)),
            Plot::new("sources-chart", &sources_figure(&stats)),
            Plot::new("keywords-chart", &keywords_figure(&stats)),
        ],
    };

    page.render()
        .map_err(|e| JobTrackerError::Report(format!("template render failed: {e}")))
}

/// JSON safe to embed inside a `<script>` element.
fn script_json(value: &Value) -> String {
    value
        .to_string()
        .replace("</", "<\\/")
        .replace("<!--", "<\\!--")
}
