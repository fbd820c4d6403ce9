//! Infinite-scroll emulation: keep scrolling until the result list stops growing.

use std::collections::HashSet;
use std::time::Duration;

use jobtracker_shared::{JobRecord, Result, ScrapeConfig};
use tracing::{debug, info, warn};

use crate::engine::StopReason;

/// A live page that can be read and scrolled.
pub trait ScrollSession {
    /// Current rendered HTML of the page.
    fn content(&self) -> Result<String>;

    /// Scroll to the bottom (loading more results) and return the new page height.
    fn scroll(&self) -> Result<u64>;
}

/// Bounds for [`collect_until_stable`].
#[derive(Debug, Clone)]
pub struct ScrollPolicy {
    /// Hard upper bound on read/scroll rounds.
    pub max_attempts: u32,
    /// Consecutive rounds without a new link before giving up.
    pub stable_rounds: u32,
    /// Pause after each scroll for lazy-loaded cards.
    pub wait: Duration,
}

impl From<&ScrapeConfig> for ScrollPolicy {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            max_attempts: config.scroll_max_attempts,
            stable_rounds: config.scroll_stable_rounds.max(1),
            wait: config.scroll_wait,
        }
    }
}

/// Result of a scroll-until-stable loop.
#[derive(Debug, Clone)]
pub struct ScrollOutcome {
    /// Unique records in first-seen order, truncated to the limit.
    pub jobs: Vec<JobRecord>,
    /// Read rounds performed.
    pub attempts: u32,
    pub stop: StopReason,
}

/// Read, extract and scroll until no new links appear for
/// `policy.stable_rounds` rounds, `limit` records are collected, or
/// `policy.max_attempts` rounds have run.
///
/// A session failure ends the loop with whatever was collected so far.
pub fn collect_until_stable<S, F>(
    session: &S,
    policy: &ScrollPolicy,
    limit: usize,
    mut extract: F,
) -> ScrollOutcome
where
    S: ScrollSession + ?Sized,
    F: FnMut(&str) -> Vec<JobRecord>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut jobs: Vec<JobRecord> = Vec::new();
    let mut stale_rounds: u32 = 0;
    let mut last_height: Option<u64> = None;
    let mut attempts: u32 = 0;
    let mut stop = StopReason::PageLimit;

    while attempts < policy.max_attempts {
        attempts += 1;

        let html = match session.content() {
            Ok(html) => html,
            Err(e) => {
                warn!(attempt = attempts, error = %e, "could not read page, keeping results so far");
                stop = StopReason::SessionError;
                break;
            }
        };

        let fresh: Vec<JobRecord> = extract(&html)
            .into_iter()
            .filter(|job| seen.insert(job.link.clone()))
            .collect();
        let new_count = fresh.len();
        jobs.extend(fresh);

        stale_rounds = if new_count == 0 { stale_rounds + 1 } else { 0 };
        debug!(
            attempt = attempts,
            new = new_count,
            total = jobs.len(),
            stale_rounds,
            "scroll round"
        );

        if jobs.len() >= limit {
            stop = StopReason::LimitReached;
            break;
        }
        if stale_rounds >= policy.stable_rounds {
            stop = StopReason::NoNewResults;
            break;
        }
        if attempts == policy.max_attempts {
            break;
        }

        match session.scroll() {
            Ok(height) => {
                if last_height == Some(height) {
                    debug!(height, "page height unchanged after scroll");
                }
                last_height = Some(height);
            }
            Err(e) => {
                warn!(attempt = attempts, error = %e, "scroll failed, keeping results so far");
                stop = StopReason::SessionError;
                break;
            }
        }

        if !policy.wait.is_zero() {
            std::thread::sleep(policy.wait);
        }
    }

    jobs.truncate(limit);
    info!(attempts, collected = jobs.len(), stop = ?stop, "scroll loop finished");

    ScrollOutcome {
        jobs,
        attempts,
        stop,
    }
}
