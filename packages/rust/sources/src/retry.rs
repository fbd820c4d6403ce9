//! Bounded retry with randomized backoff for listing page fetches.

use std::time::Duration;

use jobtracker_shared::{JobTrackerError, Result, ScrapeConfig};
use rand::Rng;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

/// How often and how long to wait before giving up on a page.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per page (not additional retries).
    pub max_retries: u32,
    /// Base wait after HTTP 429.
    pub rate_limit_wait: Duration,
    /// Upper bound of the random extra wait after HTTP 429.
    pub rate_limit_jitter: Duration,
    /// Wait after a transport error or other non-success status.
    pub error_backoff: Duration,
}

impl From<&ScrapeConfig> for RetryPolicy {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_wait: config.rate_limit_wait,
            rate_limit_jitter: config.rate_limit_jitter,
            error_backoff: config.error_backoff,
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying a rate-limited request: base plus random jitter.
    pub fn rate_limit_delay(&self) -> Duration {
        self.rate_limit_wait + random_up_to(self.rate_limit_jitter)
    }
}

/// Uniform random duration in `0..=max` at millisecond resolution.
pub(crate) fn random_up_to(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Uniform random duration in `min..=max`. Returns `min` for an empty range.
pub(crate) fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    min + random_up_to(max - min)
}

/// Fetch `url` and return the body, retrying rate limits and failures.
///
/// Makes at most `policy.max_retries` requests. HTTP 429 waits
/// [`RetryPolicy::rate_limit_delay`]; any other failure waits `error_backoff`.
/// No wait follows the final attempt.
pub async fn fetch_with_retry(client: &Client, url: &Url, policy: &RetryPolicy) -> Result<String> {
    for attempt in 1..=policy.max_retries {
        let last_attempt = attempt == policy.max_retries;

        let wait = match client.get(url.as_str()).send().await {
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                let wait = policy.rate_limit_delay();
                warn!(%url, attempt, wait_secs = wait.as_secs(), "rate limited");
                wait
            }
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    debug!(%url, attempt, bytes = body.len(), "page fetched");
                    return Ok(body);
                }
                Err(e) => {
                    warn!(%url, attempt, error = %e, "body read failed");
                    policy.error_backoff
                }
            },
            Ok(response) => {
                warn!(%url, attempt, status = %response.status(), "unexpected status");
                policy.error_backoff
            }
            Err(e) => {
                warn!(%url, attempt, error = %e, "request failed");
                policy.error_backoff
            }
        };

        if !last_attempt && !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    Err(JobTrackerError::RetriesExhausted {
        url: url.to_string(),
        attempts: policy.max_retries,
    })
}
