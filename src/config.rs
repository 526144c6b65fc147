use std::path::PathBuf;
use std::time::Duration;

use crate::browser::IntakeBrowser;
use crate::error::Result;
use crate::surface::ResponseFilter;

/// The intake form this crate drives.
pub const FORM_URL: &str = "https://qa-technical-assessment.vercel.app/form";

pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Timeout for a single CDP request (default: 30s).
    pub default_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            default_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the timeout for a single CDP request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<IntakeBrowser> {
        IntakeBrowser::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds for the polling waits that stand in for readiness signals the
/// target page does not expose.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub poll_interval: Duration,
    /// Upper bound for a single element or widget to settle.
    pub settle_timeout: Duration,
    /// Upper bound for the page to react to a submit.
    pub submit_settle: Duration,
    /// Upper bound for observing the acknowledgment response.
    pub response_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            settle_timeout: Duration::from_secs(3),
            submit_settle: Duration::from_secs(2),
            response_timeout: Duration::from_secs(5),
        }
    }
}

/// Settings for one fill-and-submit run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub form_url: String,
    /// URL fragment that means "still on the form page".
    pub form_path_marker: String,
    /// Directory receiving the checkpoint screenshots.
    pub evidence_dir: PathBuf,
    pub response_filter: ResponseFilter,
    pub timing: Timing,
}

impl RunConfig {
    pub fn form_url(mut self, url: impl Into<String>) -> Self {
        self.form_url = url.into();
        self
    }

    pub fn evidence_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.evidence_dir = dir.into();
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn response_filter(mut self, filter: ResponseFilter) -> Self {
        self.response_filter = filter;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            form_url: FORM_URL.to_string(),
            form_path_marker: "/form".to_string(),
            evidence_dir: PathBuf::from("."),
            response_filter: ResponseFilter::default(),
            timing: Timing::default(),
        }
    }
}
