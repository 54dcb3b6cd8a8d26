//! Snapshot data model
//!
//! A Snapshot is the portable unit of session state: cookies, per-origin
//! localStorage, and one string-encoded dump per structured database, plus
//! the URL the database contents were captured from. The JSON layout is
//! stable; unknown fields are ignored and missing sections default to
//! empty so partial snapshots stay loadable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::dump::DatabaseDump;

/// One browser cookie as captured from and replayed into the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix timestamp in seconds; zero or negative means a session cookie.
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl CookieRecord {
    pub fn is_session(&self) -> bool {
        self.expires <= 0.0
    }
}

/// One localStorage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub name: String,
    pub value: String,
}

/// Flat key-value storage of one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageItem>,
}

/// Complete portable capture of one browser session's client-side state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
    /// Database name to string-encoded dump.
    #[serde(default)]
    pub idbs: BTreeMap<String, String>,
    /// URL the structured databases were captured from. Restore navigates
    /// here first since structured storage is partitioned per origin.
    #[serde(default)]
    pub idbs_url: String,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty() && self.idbs.is_empty()
    }

    /// Parse every embedded database dump, keyed by database name.
    pub fn database_dumps(&self) -> Result<BTreeMap<String, DatabaseDump>, serde_json::Error> {
        self.idbs
            .iter()
            .map(|(name, raw)| Ok((name.clone(), DatabaseDump::parse(raw)?)))
            .collect()
    }
}
