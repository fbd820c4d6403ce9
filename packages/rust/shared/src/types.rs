//! Core domain types for collected job listings.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SubsecRound, Timelike};
use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical on-disk format for `run_time` values (minute precision).
pub const RUN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Column order of the persisted CSV dataset.
pub const CSV_COLUMNS: [&str; 7] = [
    "title", "company", "location", "link", "source", "job_id", "run_time",
];

// ---------------------------------------------------------------------------
// JobSource
// ---------------------------------------------------------------------------

/// Which listing board a record was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobSource {
    LinkedIn,
    GoogleCareers,
}

impl JobSource {
    /// All sources, in the order a run scrapes them.
    pub const ALL: [JobSource; 2] = [JobSource::LinkedIn, JobSource::GoogleCareers];

    /// Display label, also used as the CSV value.
    pub fn label(self) -> &'static str {
        match self {
            Self::LinkedIn => "LinkedIn",
            Self::GoogleCareers => "Google Careers",
        }
    }
}

impl std::fmt::Display for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "linkedin" => Ok(Self::LinkedIn),
            "googlecareers" | "google" => Ok(Self::GoogleCareers),
            _ => Err(format!("unknown job source '{s}'")),
        }
    }
}

impl TryFrom<String> for JobSource {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobSource> for String {
    fn from(source: JobSource) -> Self {
        source.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// One row of the persisted dataset. `link` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub source: JobSource,
    #[serde(default)]
    pub job_id: String,
    /// Capture time of the run that produced this row. `None` when a legacy
    /// row carries an unparseable timestamp.
    #[serde(default, with = "run_time_serde")]
    pub run_time: Option<NaiveDateTime>,
}

impl JobRecord {
    /// The run identifier this record belongs to (`run_time` at minute precision).
    pub fn run_id(&self) -> Option<String> {
        self.run_time.map(format_run_time)
    }
}

mod run_time_serde {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&super::format_run_time(*t)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_run_time))
    }
}

// ---------------------------------------------------------------------------
// Run timestamps
// ---------------------------------------------------------------------------

/// Capture the timestamp shared by every record of the current run.
pub fn capture_run_time() -> NaiveDateTime {
    let now = Local::now().naive_local().trunc_subsecs(0);
    now.with_second(0).unwrap_or(now)
}

/// Format a run time the way it is stored in the CSV.
pub fn format_run_time(t: NaiveDateTime) -> String {
    t.format(RUN_TIME_FORMAT).to_string()
}

/// Parse a `run_time` cell leniently. Older datasets mix several formats.
pub fn parse_run_time(raw: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 6] = [
        RUN_TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(t);
        }
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.naive_local());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Normalize a posting link for use as the dedup key (drop query + fragment).
pub fn normalize_link(link: &str) -> String {
    let link = link.trim();
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => link
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Whether a link is an absolute `http`/`https` URL.
pub fn is_web_link(link: &str) -> bool {
    Url::parse(link.trim()).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Resolve `href` against `base` and normalize it. Links that do not resolve
/// to `http`/`https` yield `None`.
pub fn resolve_web_link(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| normalize_link(url.as_str()))
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Whether the pipeline runs on a CI runner or on a developer machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    Ci,
    #[default]
    Local,
}

impl ExecutionContext {
    pub fn is_ci(self) -> bool {
        self == Self::Ci
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(link: &str, run_time: Option<&str>) -> JobRecord {
        JobRecord {
            title: "Data Scientist".into(),
            company: "Acme".into(),
            location: "Tel Aviv".into(),
            link: link.into(),
            source: JobSource::LinkedIn,
            job_id: "4011".into(),
            run_time: run_time.and_then(parse_run_time),
        }
    }

    #[test]
    fn job_source_parses_leniently() {
        assert_eq!("LinkedIn".parse::<JobSource>(), Ok(JobSource::LinkedIn));
        assert_eq!("linkedin".parse::<JobSource>(), Ok(JobSource::LinkedIn));
        assert_eq!(
            "Google Careers".parse::<JobSource>(),
            Ok(JobSource::GoogleCareers)
        );
        assert_eq!(
            "google_careers".parse::<JobSource>(),
            Ok(JobSource::GoogleCareers)
        );
        assert!("indeed".parse::<JobSource>().is_err());
    }

    #[test]
    fn job_source_display_matches_csv_value() {
        assert_eq!(JobSource::GoogleCareers.to_string(), "Google Careers");
        let json = serde_json::to_string(&JobSource::LinkedIn).expect("serialize");
        assert_eq!(json, "\"LinkedIn\"");
    }

    #[test]
    fn run_time_lenient_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 4)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid date");

        assert_eq!(parse_run_time("2025-03-04 09:30"), Some(expected));
        assert_eq!(parse_run_time("2025-03-04 09:30:00"), Some(expected));
        assert_eq!(parse_run_time("2025-03-04T09:30:00"), Some(expected));
        assert_eq!(parse_run_time(" 2025-03-04 09:30:00.000 "), Some(expected));
        assert!(parse_run_time("2025-03-04").is_some());
        assert_eq!(parse_run_time(""), None);
        assert_eq!(parse_run_time("yesterday"), None);
    }

    #[test]
    fn captured_run_time_has_minute_precision() {
        let t = capture_run_time();
        assert_eq!(t.second(), 0);
        assert_eq!(t.nanosecond(), 0);
        assert_eq!(parse_run_time(&format_run_time(t)), Some(t));
    }

    #[test]
    fn record_json_roundtrip_keeps_run_time() {
        let rec = record("https://il.linkedin.com/jobs/view/4011", Some("2025-03-04 09:30"));
        let json = serde_json::to_string(&rec).expect("serialize");
        assert!(json.contains("\"run_time\":\"2025-03-04 09:30\""));
        let parsed: JobRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, rec);
        assert_eq!(parsed.run_id().as_deref(), Some("2025-03-04 09:30"));
    }

    #[test]
    fn unknown_run_time_serializes_empty() {
        let rec = record("https://il.linkedin.com/jobs/view/4012", None);
        let json = serde_json::to_string(&rec).expect("serialize");
        assert!(json.contains("\"run_time\":\"\""));
        assert_eq!(rec.run_id(), None);
    }

    #[test]
    fn normalize_link_strips_tracking() {
        assert_eq!(
            normalize_link("https://il.linkedin.com/jobs/view/data-scientist-4011?refId=abc&trk=x"),
            "https://il.linkedin.com/jobs/view/data-scientist-4011"
        );
        assert_eq!(
            normalize_link("https://www.google.com/about/careers/applications/jobs/results/123-ds#top"),
            "https://www.google.com/about/careers/applications/jobs/results/123-ds"
        );
        assert_eq!(normalize_link("jobs/results/9?q=x"), "jobs/results/9");
    }

    #[test]
    fn web_links_only() {
        assert!(is_web_link("https://il.linkedin.com/jobs/view/1"));
        assert!(is_web_link(" http://127.0.0.1:8080/jobs/view/2 "));
        assert!(!is_web_link("javascript:alert(document.cookie)"));
        assert!(!is_web_link("data:text/html,<b>x</b>"));
        assert!(!is_web_link("jobs/results/9"));
    }

    #[test]
    fn resolve_web_link_rejects_script_hrefs() {
        let page = Url::parse("https://www.google.com/about/careers/applications/").unwrap();
        assert_eq!(
            resolve_web_link(&page, "jobs/results/123-ds?hl=en").as_deref(),
            Some("https://www.google.com/about/careers/applications/jobs/results/123-ds")
        );
        assert_eq!(resolve_web_link(&page, "javascript:alert(document.cookie)"), None);
        assert_eq!(resolve_web_link(&page, " JavaScript:alert(1)"), None);
        assert_eq!(resolve_web_link(&page, "mailto:jobs@example.com"), None);
    }

    #[test]
    fn ci_context() {
        assert!(ExecutionContext::Ci.is_ci());
        assert!(!ExecutionContext::default().is_ci());
    }
}
