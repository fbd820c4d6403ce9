//! Headless Chrome session for boards that only grow their result list on scroll.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};
use jobtracker_shared::{JobTrackerError, Result, ScrapeConfig};
use tracing::{debug, info};
use url::Url;

use crate::scroll::ScrollSession;

/// Scrolls to the bottom, clicks LinkedIn's "See more jobs" button when it is
/// showing, and reports the document height.
const SCROLL_SCRIPT: &str = r#"(() => {
    window.scrollTo(0, document.body.scrollHeight);
    const more = document.querySelector('button.infinite-scroller__show-more-button');
    if (more && more.offsetParent !== null && !more.disabled) { more.click(); }
    return document.body.scrollHeight;
})()"#;

/// Launch settings for [`BrowserSession`].
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Chrome's sandbox usually has to be off inside CI containers.
    pub sandbox: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    /// Navigation and idle timeout.
    pub timeout: Duration,
}

impl BrowserOptions {
    pub fn from_config(config: &ScrapeConfig, user_agent: &str) -> Self {
        Self {
            headless: config.headless,
            sandbox: config.sandbox,
            chrome_path: config.chrome_path.clone(),
            user_agent: user_agent.to_string(),
            timeout: config.timeout.max(Duration::from_secs(30)),
        }
    }
}

/// A browser process with one open tab.
///
/// Dropping the session closes the tab and shuts the browser down, so the
/// process is released whether the scrape succeeded or not.
pub struct BrowserSession {
    // Field order matters: the tab is closed in `Drop` before the browser goes.
    tab: Arc<Tab>,
    _browser: Browser,
}

impl BrowserSession {
    /// Start a browser and open a blank tab.
    pub fn launch(options: &BrowserOptions) -> Result<Self> {
        let ua_arg = OsString::from(format!("--user-agent={}", options.user_agent));
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--lang=en-US"),
            ua_arg.as_os_str(),
        ];

        let launch = LaunchOptions {
            headless: options.headless,
            sandbox: options.sandbox,
            path: options.chrome_path.clone(),
            idle_browser_timeout: options.timeout * 4,
            args,
            ..Default::default()
        };

        let browser = Browser::new(launch)
            .map_err(|e| JobTrackerError::Browser(format!("failed to launch browser: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| JobTrackerError::Browser(format!("failed to open tab: {e}")))?;
        tab.set_default_timeout(options.timeout);

        info!(headless = options.headless, sandbox = options.sandbox, "browser session acquired");
        Ok(Self {
            tab,
            _browser: browser,
        })
    }

    /// Navigate to `url` and wait for the document to load.
    pub fn open(&self, url: &Url) -> Result<()> {
        self.tab
            .navigate_to(url.as_str())
            .and_then(|tab| tab.wait_until_navigated())
            .and_then(|tab| tab.wait_for_element("body").map(|_| ()))
            .map_err(|e| JobTrackerError::Browser(format!("{url}: {e}")))
    }
}

impl ScrollSession for BrowserSession {
    fn content(&self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| JobTrackerError::Browser(format!("read page content: {e}")))
    }

    fn scroll(&self) -> Result<u64> {
        let result = self
            .tab
            .evaluate(SCROLL_SCRIPT, false)
            .map_err(|e| JobTrackerError::Browser(format!("scroll script: {e}")))?;
        Ok(result
            .value
            .and_then(|v| v.as_f64())
            .map(|h| h.max(0.0) as u64)
            .unwrap_or(0))
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!(error = %e, "tab close failed during release");
        }
        info!("browser session released");
    }
}
