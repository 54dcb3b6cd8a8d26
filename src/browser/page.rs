//! Page driver boundary
//!
//! Everything the capture and restore engines need from a browser goes
//! through [`PageDriver`]: navigation, script evaluation, reload, cookies,
//! and waiting for the page to go away. Production code drives a real
//! Chrome over the DevTools protocol; tests drive [`crate::browser::mock::MockPage`].

use async_trait::async_trait;

use crate::snapshot::CookieRecord;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no Chrome or Chromium binary found on PATH")]
    BinaryNotFound,

    #[error("browser configuration rejected: {0}")]
    Config(String),

    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation produced no value")]
    MissingValue,

    #[error("page closed")]
    PageClosed,

    #[error("cookie {name} rejected: {reason}")]
    Cookie { name: String, reason: String },
}

/// A live page bound to one origin.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// URL the page is currently on.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Navigate and wait until the document is interactive. Full load is
    /// not awaited; only the storage subsystem needs to be reachable.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Run a script expression in the page, awaiting any promise it
    /// returns, and hand back the JSON value it produced.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, BrowserError>;

    /// Reload the page so the application re-reads its storage.
    async fn reload(&self) -> Result<(), BrowserError>;

    /// Resolve once the page or its browser has gone away.
    async fn wait_for_close(&self) -> Result<(), BrowserError>;

    /// All cookies visible to the browser, not just the current origin.
    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError>;

    /// Write cookies into the browser's jar.
    async fn set_cookies(&self, records: &[CookieRecord]) -> Result<(), BrowserError>;
}
