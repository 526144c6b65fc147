use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::future::BoxFuture;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::{BrowserBuilder, BrowserConfig};
use crate::error::{Error, Result};
use crate::page::Page;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

/// A launched Chrome instance. Close it with [`IntakeBrowser::close`].
pub struct IntakeBrowser {
    browser: CrBrowser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl IntakeBrowser {
    /// Create a new BrowserBuilder for configuring and launching a browser.
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Launch a browser instance with the given configuration.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let mut builder = CrBrowserConfig::builder();

        if config.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.request_timeout(config.default_timeout);

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let cr_config = builder
            .build()
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        info!(headless = config.headless, "browser launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a new page (tab) navigated to the given URL.
    /// Network recording starts before navigation.
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;

        let page = Page::attach(cr_page).await?;
        page.goto(url).await?;
        debug!(url, "page loaded");
        Ok(page)
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.map_err(Error::CdpError)?;
        self.browser.wait().await?;
        self.handler_task.abort();
        info!("browser closed");
        Ok(())
    }

    /// Open `url`, run `task` against the page, then close the browser on
    /// every exit path, including when opening the page fails.
    pub async fn with_page<T, F>(self, url: &str, task: F) -> Result<T>
    where
        F: for<'p> FnOnce(&'p Page) -> BoxFuture<'p, T>,
    {
        let outcome = match self.new_page(url).await {
            Ok(page) => {
                let value = task(&page).await;
                drop(page);
                Ok(value)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = self.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        outcome
    }
}
