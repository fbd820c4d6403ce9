//! Dashboard generation for the collected job dataset.
//!
//! - [`stats`]: aggregates (jobs per run, companies, sources, title keywords)
//! - [`charts`]: Plotly figure specs
//! - [`html`]: the self-contained HTML page (askama template)
//!
//! [`write_report`] persists a rendered page atomically.

pub mod charts;
pub mod html;
pub mod stats;

use std::fs;
use std::path::Path;

use jobtracker_shared::{JobTrackerError, Result};
use tracing::info;

pub use html::{render_report, render_report_at};
pub use stats::{ReportOptions, ReportStats, RunCount, title_words};

/// Write a rendered report to `path` (temp file, then rename).
pub fn write_report(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| JobTrackerError::io(parent, e))?;
    }

    let name = path
        .file_name()
        .ok_or_else(|| JobTrackerError::Report(format!("not a file path: {}", path.display())))?
        .to_string_lossy();
    let temp = path.with_file_name(format!(".{name}.tmp"));

    fs::write(&temp, html).map_err(|e| JobTrackerError::io(&temp, e))?;
    fs::rename(&temp, path).map_err(|e| JobTrackerError::io(path, e))?;

    info!(path = %path.display(), bytes = html.len(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn write_report_creates_parent_and_leaves_no_temp() {
        let dir = std::env::temp_dir().join(format!("jt_report_{}", Uuid::now_v7()));
        let path = dir.join("site").join("jobs_dashboard.html");

        let html = render_report(&[], &ReportOptions::default()).unwrap();
        write_report(&path, &html).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), html);
        assert!(!dir.join("site").join(".jobs_dashboard.html.tmp").exists());

        // Overwrites in place.
        write_report(&path, "<html></html>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html></html>");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_report_rejects_directory_like_path() {
        assert!(write_report(Path::new("/"), "x").is_err());
    }
}
