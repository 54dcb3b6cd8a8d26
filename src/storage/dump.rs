//! Database dump format
//!
//! One dump describes the full contents of one structured database: its
//! name, the schema version it had at capture time, and per store the full
//! key to value mapping. Dumps travel inside a Snapshot as one JSON string
//! per database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::value::StoredValue;

/// Contents of one object store: key to captured value, keys stringified.
pub type StoreDump = BTreeMap<String, StoredValue>;

/// Serialized form of one structured database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDump {
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub stores: BTreeMap<String, StoreDump>,
}

impl DatabaseDump {
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
            stores: BTreeMap::new(),
        }
    }

    /// Encode this dump into the string form carried by a Snapshot.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a dump from its Snapshot string form.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn store_names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn entry_count(&self) -> usize {
        self.stores.values().map(BTreeMap::len).sum()
    }
}
