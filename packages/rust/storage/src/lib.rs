//! CSV-backed job dataset.
//!
//! The [`JobStore`] owns the on-disk CSV file; a [`Dataset`] is the in-memory
//! view with link-based deduplication.
//!
//! **Rules:**
//! - `link` (normalized, query and fragment dropped) is unique across the dataset
//! - merging is last-write-wins on content, first-seen on position
//! - loading is lenient: legacy extra columns are ignored, bad rows are skipped
//! - a `run_time` cell that does not parse is written back verbatim on save
//! - saving writes a temp file and renames it over the target

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use jobtracker_shared::{
    CSV_COLUMNS, JobRecord, JobSource, JobTrackerError, Result, format_run_time, is_web_link,
    normalize_link, parse_run_time,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Outcome of [`Dataset::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Links not present before.
    pub added: usize,
    /// Existing links whose row content changed.
    pub updated: usize,
}

/// The cumulative set of job records, unique by link.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<JobRecord>,
    index: HashMap<String, usize>,
    /// Original `run_time` cells that did not parse, by link.
    raw_run_times: HashMap<String, String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset, collapsing duplicate links (later rows win).
    pub fn from_records(records: impl IntoIterator<Item = JobRecord>) -> Self {
        let mut dataset = Self::new();
        dataset.merge(records);
        dataset
    }

    /// Merge a batch into the dataset.
    ///
    /// A record whose link already exists replaces the stored row in place;
    /// new links are appended in batch order. Merging the same batch twice
    /// leaves the dataset as it was after the first merge.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = JobRecord>) -> MergeStats {
        let mut stats = MergeStats::default();

        for mut record in batch {
            record.link = normalize_link(&record.link);
            if record.link.is_empty() {
                continue;
            }

            match self.index.get(&record.link) {
                Some(&pos) => {
                    if record.run_time.is_some() {
                        self.raw_run_times.remove(&record.link);
                    }
                    if self.records[pos] != record {
                        self.records[pos] = record;
                        stats.updated += 1;
                    }
                }
                None => {
                    self.index.insert(record.link.clone(), self.records.len());
                    self.records.push(record);
                    stats.added += 1;
                }
            }
        }

        stats
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a link (in any query-string variant) is already stored.
    pub fn contains(&self, link: &str) -> bool {
        self.index.contains_key(&normalize_link(link))
    }

    pub fn get(&self, link: &str) -> Option<&JobRecord> {
        self.index
            .get(&normalize_link(link))
            .map(|&pos| &self.records[pos])
    }

    /// The `run_time` cell as it should be persisted: the canonical format when
    /// known, otherwise whatever the source file held.
    pub fn run_time_cell(&self, record: &JobRecord) -> String {
        match record.run_time {
            Some(t) => format_run_time(t),
            None => self
                .raw_run_times
                .get(&record.link)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Remember an unparseable `run_time` cell for a stored link.
    fn keep_raw_run_time(&mut self, link: String, raw: String) {
        if self.get(&link).is_some_and(|r| r.run_time.is_none()) {
            self.raw_run_times.insert(link, raw);
        }
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// Row shape accepted on load. Every column is optional so older files with
/// missing or extra columns still read.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    run_time: String,
}

impl CsvRow {
    /// Convert to a record, returning the raw `run_time` cell alongside it when
    /// the cell is non-empty but unparseable.
    fn into_record(self) -> std::result::Result<(JobRecord, Option<String>), String> {
        let link = normalize_link(&self.link);
        if link.is_empty() {
            return Err("missing link".into());
        }
        if !is_web_link(&link) {
            return Err(format!("not an http(s) link: {link}"));
        }
        let source: JobSource = self.source.parse()?;

        let raw_run_time = self.run_time.trim();
        let run_time = parse_run_time(raw_run_time);
        let unparsed = (run_time.is_none() && !raw_run_time.is_empty())
            .then(|| raw_run_time.to_string());

        let record = JobRecord {
            title: self.title.trim().to_string(),
            company: self.company.trim().to_string(),
            location: self.location.trim().to_string(),
            link,
            source,
            job_id: self.job_id.trim().to_string(),
            run_time,
        };
        Ok((record, unparsed))
    }
}

/// Reads and writes the dataset CSV at a fixed path.
#[derive(Debug, Clone)]
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the dataset. A missing file is an empty dataset.
    pub fn load(&self) -> Result<Dataset> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no dataset yet, starting empty");
            return Ok(Dataset::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .map_err(|e| JobTrackerError::Storage(format!("{}: {e}", self.path.display())))?;

        let mut records = Vec::new();
        let mut unparsed = Vec::new();
        let mut skipped = 0usize;

        for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
            // Header is line 1.
            let line = i + 2;
            match row {
                Ok(row) => match row.into_record() {
                    Ok((record, raw)) => {
                        if let Some(raw) = raw {
                            debug!(line, run_time = %raw, "keeping unparseable run_time as-is");
                            unparsed.push((record.link.clone(), raw));
                        }
                        records.push(record);
                    }
                    Err(reason) => {
                        warn!(line, reason = %reason, "skipping dataset row");
                        skipped += 1;
                    }
                },
                Err(e) => {
                    warn!(line, error = %e, "skipping unreadable dataset row");
                    skipped += 1;
                }
            }
        }

        let rows = records.len();
        let mut dataset = Dataset::from_records(records);
        for (link, raw) in unparsed {
            dataset.keep_raw_run_time(link, raw);
        }
        info!(
            path = %self.path.display(),
            rows,
            unique = dataset.len(),
            skipped,
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Write the dataset atomically (temp file, then rename).
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| JobTrackerError::io(parent, e))?;
        }

        let temp = temp_path(&self.path);
        write_csv(&temp, dataset).inspect_err(|_| {
            let _ = fs::remove_file(&temp);
        })?;
        fs::rename(&temp, &self.path).map_err(|e| JobTrackerError::io(&self.path, e))?;

        info!(path = %self.path.display(), rows = dataset.len(), "dataset saved");
        Ok(())
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jobs.csv".into());
    target.with_file_name(format!(".{name}.tmp"))
}

fn write_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let storage_err = |e: csv::Error| JobTrackerError::Storage(format!("{}: {e}", path.display()));

    let mut writer = csv::Writer::from_path(path).map_err(storage_err)?;
    writer.write_record(CSV_COLUMNS).map_err(storage_err)?;
    for record in dataset.records() {
        let run_time = dataset.run_time_cell(record);
        writer
            .write_record([
                record.title.as_str(),
                record.company.as_str(),
                record.location.as_str(),
                record.link.as_str(),
                record.source.label(),
                record.job_id.as_str(),
                run_time.as_str(),
            ])
            .map_err(storage_err)?;
    }
    writer.flush().map_err(|e| JobTrackerError::io(path, e))?;
    Ok(())
}
