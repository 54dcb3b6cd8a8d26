//! Chrome session over the DevTools protocol
//!
//! Launches a local Chrome or Chromium, spawns the CDP event handler loop
//! on the runtime, and exposes one page as a [`PageDriver`]. The binary is
//! located on PATH unless an explicit executable is configured.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, SetCookiesParams, TimeSinceEpoch,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::browser::page::{BrowserError, PageDriver};
use crate::snapshot::CookieRecord;

const READY_POLLS: u32 = 50;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CLOSE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How to launch the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Explicit browser binary; PATH discovery otherwise.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Profile directory; a throwaway one when unset.
    pub user_data_dir: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }
}

/// First Chrome-family binary found on PATH.
pub fn default_executable() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ];
    CANDIDATES.iter().find_map(|name| which::which(name).ok())
}

/// A launched browser with one page attached.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(options: LaunchOptions) -> Result<Self, BrowserError> {
        let executable = match options.executable {
            Some(path) => path,
            None => default_executable().ok_or(BrowserError::BinaryNotFound)?,
        };
        tracing::info!(executable = %executable.display(), headless = options.headless, "launching browser");

        let mut builder = BrowserConfig::builder().chrome_executable(&executable);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let config = builder.build().map_err(BrowserError::Config)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // The handler stream must be polled for the whole browser lifetime
        // or every CDP call stalls.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Shut the browser down and stop the handler loop.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn current_url(&self) -> Result<String, BrowserError> {
        self.page.url().await?.ok_or(BrowserError::PageClosed)
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        // goto resolves when the navigation commits; wait for the parser
        // to hand the document over so storage APIs are reachable.
        for _ in 0..READY_POLLS {
            let ready = self.page.evaluate("document.readyState".to_string()).await?;
            let state = ready.value().and_then(|v| v.as_str());
            if state.is_some_and(|s| s != "loading") {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        tracing::warn!(url, "document never became interactive, continuing anyway");
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self.page.evaluate(expression.to_string()).await?;
        result.value().cloned().ok_or(BrowserError::MissingValue)
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.page.reload().await?;
        Ok(())
    }

    async fn wait_for_close(&self) -> Result<(), BrowserError> {
        // The page's session stops answering once the target or the whole
        // browser goes away.
        loop {
            if self.page.evaluate("true".to_string()).await.is_err() {
                return Ok(());
            }
            tokio::time::sleep(CLOSE_POLL_INTERVAL).await;
        }
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        // The set is scoped to the page's URLs, not the whole profile.
        let cookies = self.page.get_cookies().await?;
        Ok(cookies.iter().map(cookie_record).collect())
    }

    async fn set_cookies(&self, records: &[CookieRecord]) -> Result<(), BrowserError> {
        let mut params = Vec::with_capacity(records.len());
        for record in records {
            params.push(cookie_param(record)?);
        }
        self.page.execute(SetCookiesParams::new(params)).await?;
        Ok(())
    }
}

fn cookie_record(cookie: &Cookie) -> CookieRecord {
    CookieRecord {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        expires: cookie.expires,
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site.as_ref().map(|s| s.as_ref().to_string()),
    }
}

fn cookie_param(record: &CookieRecord) -> Result<CookieParam, BrowserError> {
    let mut builder = CookieParam::builder()
        .name(record.name.as_str())
        .value(record.value.as_str())
        .domain(record.domain.as_str())
        .path(record.path.as_str())
        .http_only(record.http_only)
        .secure(record.secure);

    // Session cookies carry a sentinel expiry and must be set without one.
    if !record.is_session() {
        builder = builder.expires(TimeSinceEpoch::new(record.expires));
    }
    if let Some(same_site) = &record.same_site {
        match CookieSameSite::from_str(same_site) {
            Ok(policy) => builder = builder.same_site(policy),
            Err(_) => {
                tracing::warn!(cookie = %record.name, policy = %same_site, "unknown sameSite policy, dropping attribute");
            }
        }
    }

    builder.build().map_err(|reason| BrowserError::Cookie {
        name: record.name.clone(),
        reason,
    })
}
