//! HTTP client setup for listing requests.
//!
//! Both boards serve their guest pages to ordinary browsers, so requests carry
//! a rotating desktop User-Agent and the headers a browser would send.

use std::time::Duration;

use jobtracker_shared::{JobTrackerError, Result};
use rand::Rng;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, DNT, HeaderMap, HeaderValue, REFERER, UPGRADE_INSECURE_REQUESTS,
};

/// Desktop browser User-Agents rotated per client.
const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
];

/// Pick a random desktop User-Agent.
pub fn random_user_agent() -> &'static str {
    let i = rand::thread_rng().gen_range(0..DESKTOP_USER_AGENTS.len());
    DESKTOP_USER_AGENTS[i]
}

/// Browser-like default headers sent with every listing request.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Build the HTTP client used for one run.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .default_headers(default_headers())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| JobTrackerError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn user_agent_comes_from_pool() {
        for _ in 0..20 {
            assert!(DESKTOP_USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[tokio::test]
    async fn client_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("referer", "https://www.google.com/"))
            .and(header("dnt", "1"))
            .and(header("user-agent", DESKTOP_USER_AGENTS[0]))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5), DESKTOP_USER_AGENTS[0]).unwrap();
        let body = client
            .get(server.uri())
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }
}
