//! Mock page driver for deterministic testing
//!
//! Implements [`PageDriver`] without a browser. Evaluation results are
//! scripted up front and handed out in order, navigations and reloads can
//! be made to fail, and every interaction is captured for later
//! verification.
//!
//! # Example
//! ```no_run
//! use carryon::browser::mock::{MockPage, MockPageConfig};
//! use serde_json::json;
//!
//! let page = MockPage::new().with_config(
//!     MockPageConfig::default()
//!         .with_evaluations(vec![json!({"ok": true, "value": []})]),
//! );
//!
//! // Drive the page in tests...
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::browser::page::{BrowserError, PageDriver};
use crate::snapshot::CookieRecord;

/// Configuration for mock page behavior
#[derive(Clone)]
pub struct MockPageConfig {
    /// URL the page starts on.
    pub url: String,
    /// Results returned by `evaluate`, in order; `null` once exhausted.
    pub evaluations: Vec<serde_json::Value>,
    /// Cookies returned by `cookies`.
    pub cookies: Vec<CookieRecord>,
    /// Every navigation fails.
    pub fail_all_navigations: bool,
    /// The first N navigations fail, later ones succeed.
    pub fail_first_navigations: usize,
    /// Every reload fails.
    pub fail_reloads: bool,
}

impl Default for MockPageConfig {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            evaluations: Vec::new(),
            cookies: Vec::new(),
            fail_all_navigations: false,
            fail_first_navigations: 0,
            fail_reloads: false,
        }
    }
}

impl MockPageConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_evaluations(mut self, evaluations: Vec<serde_json::Value>) -> Self {
        self.evaluations = evaluations;
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<CookieRecord>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_fail_all_navigations(mut self) -> Self {
        self.fail_all_navigations = true;
        self
    }

    pub fn with_fail_navigations(mut self, count: usize) -> Self {
        self.fail_first_navigations = count;
        self
    }

    pub fn with_fail_reloads(mut self) -> Self {
        self.fail_reloads = true;
        self
    }
}

#[derive(Default)]
struct MockPageState {
    url: String,
    navigations: Vec<String>,
    reloads: usize,
    evaluated: Vec<String>,
    pending_evaluations: VecDeque<serde_json::Value>,
    cookie_writes: Vec<Vec<CookieRecord>>,
}

/// Mock page for testing
///
/// Captures all interactions for later verification and never talks to a
/// real browser. `wait_for_close` resolves immediately.
pub struct MockPage {
    config: MockPageConfig,
    state: Arc<Mutex<MockPageState>>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock with a MockPageConfig
    pub fn with_config(self, config: MockPageConfig) -> Self {
        let state = MockPageState {
            url: config.url.clone(),
            pending_evaluations: config.evaluations.iter().cloned().collect(),
            ..MockPageState::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Every URL passed to `navigate`, failed attempts included.
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.state.lock().reloads
    }

    /// Every script passed to `evaluate`, in call order.
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.state.lock().evaluated.clone()
    }

    /// Every batch passed to `set_cookies`.
    pub fn cookie_writes(&self) -> Vec<Vec<CookieRecord>> {
        self.state.lock().cookie_writes.clone()
    }

    /// Reset captured state and re-arm the scripted evaluations.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.url = self.config.url.clone();
        state.navigations.clear();
        state.reloads = 0;
        state.evaluated.clear();
        state.pending_evaluations = self.config.evaluations.iter().cloned().collect();
        state.cookie_writes.clear();
    }
}

impl Default for MockPage {
    fn default() -> Self {
        let config = MockPageConfig::default();
        let state = MockPageState {
            url: config.url.clone(),
            ..MockPageState::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        state.navigations.push(url.to_string());

        let failing = self.config.fail_all_navigations
            || state.navigations.len() <= self.config.fail_first_navigations;
        if failing {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "mock navigation failure".to_string(),
            });
        }

        state.url = url.to_string();
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, BrowserError> {
        let mut state = self.state.lock();
        state.evaluated.push(expression.to_string());
        Ok(state
            .pending_evaluations
            .pop_front()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock();
        if self.config.fail_reloads {
            return Err(BrowserError::Navigation {
                url: state.url.clone(),
                reason: "mock reload failure".to_string(),
            });
        }
        state.reloads += 1;
        Ok(())
    }

    async fn wait_for_close(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        Ok(self.config.cookies.clone())
    }

    async fn set_cookies(&self, records: &[CookieRecord]) -> Result<(), BrowserError> {
        self.state.lock().cookie_writes.push(records.to_vec());
        Ok(())
    }
}
