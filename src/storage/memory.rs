//! In-memory storage bridge for deterministic testing
//!
//! Implements [`StorageBridge`] over plain maps instead of a live page, with
//! the version and blocking rules of the real engine: open-on-missing
//! creates an empty database at version 1, opening below the current
//! version fails, opening above it raises the version, and a version raise
//! is blocked while other connections hold the database. Failure injection
//! and introspection hooks make capture/restore flows testable end to end
//! without a browser.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::storage::bridge::{
    ConnId, DatabaseInfo, ItemFailure, OpenOutcome, StorageBridge, StorageError, StoreInfo,
    WriteOutcome,
};
use crate::storage::dump::StoreDump;
use crate::storage::value::StoredValue;

/// Configuration for in-memory bridge behavior
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Engine-opened connections keep the database held instead of closing
    /// on `versionchange` (simulates a handler that never got to run).
    pub own_conns_ignore_versionchange: bool,
    /// External holders close as soon as a version raise announces itself.
    pub holders_cede_on_versionchange: bool,
    /// External holders block one open, then close. The next open succeeds.
    pub holders_cede_after_blocked: bool,
    /// Stores whose write transactions abort.
    pub fail_write_stores: BTreeSet<String>,
    /// Stores whose reads fail.
    pub fail_read_stores: BTreeSet<String>,
    /// Per-store keys that fail to apply without aborting the transaction.
    pub fail_item_keys: BTreeMap<String, BTreeSet<String>>,
    /// Database enumeration fails.
    pub fail_list: bool,
}

impl MemoryConfig {
    pub fn with_stubborn_own_conns(mut self) -> Self {
        self.own_conns_ignore_versionchange = true;
        self
    }

    pub fn with_ceding_holders(mut self) -> Self {
        self.holders_cede_on_versionchange = true;
        self
    }

    pub fn with_holders_ceding_after_blocked(mut self) -> Self {
        self.holders_cede_after_blocked = true;
        self
    }

    pub fn with_failing_write(mut self, store: impl Into<String>) -> Self {
        self.fail_write_stores.insert(store.into());
        self
    }

    pub fn with_failing_read(mut self, store: impl Into<String>) -> Self {
        self.fail_read_stores.insert(store.into());
        self
    }

    pub fn with_failing_item(mut self, store: impl Into<String>, key: impl Into<String>) -> Self {
        self.fail_item_keys
            .entry(store.into())
            .or_default()
            .insert(key.into());
        self
    }

    pub fn with_failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct MemStore {
    key_path: Option<String>,
    auto_increment: bool,
    entries: BTreeMap<String, StoredValue>,
    next_auto_key: u64,
}

#[derive(Debug, Clone, Default)]
struct MemDatabase {
    version: u64,
    stores: BTreeMap<String, MemStore>,
}

impl MemDatabase {
    fn store_infos(&self) -> Vec<StoreInfo> {
        self.stores
            .iter()
            .map(|(name, store)| StoreInfo {
                name: name.clone(),
                key_path: store.key_path.clone(),
            })
            .collect()
    }
}

#[derive(Default)]
struct MemState {
    databases: BTreeMap<String, MemDatabase>,
    /// Engine-opened connections: id to database name.
    connections: HashMap<u64, String>,
    /// Simulated foreign connections (the page's own application).
    holders: BTreeMap<String, u32>,
}

/// In-memory storage bridge for testing
pub struct MemoryStorageBridge {
    config: MemoryConfig,
    state: Arc<Mutex<MemState>>,
}

impl MemoryStorageBridge {
    pub fn new() -> Self {
        Self {
            config: MemoryConfig::default(),
            state: Arc::new(Mutex::new(MemState::default())),
        }
    }

    pub fn with_config(mut self, config: MemoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a database at `version` (no stores).
    pub fn seed_database(&self, name: impl Into<String>, version: u64) {
        let mut state = self.state.lock();
        state.databases.entry(name.into()).or_default().version = version;
    }

    /// Create a store with the given key-path policy and contents. The
    /// parent database is created at version 1 if it does not exist.
    pub fn seed_store(
        &self,
        database: &str,
        store: impl Into<String>,
        key_path: Option<&str>,
        entries: &[(&str, StoredValue)],
    ) {
        let mut state = self.state.lock();
        let db = state.databases.entry(database.to_string()).or_default();
        if db.version == 0 {
            db.version = 1;
        }
        db.stores.insert(
            store.into(),
            MemStore {
                key_path: key_path.map(str::to_string),
                auto_increment: key_path.is_none(),
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                next_auto_key: 0,
            },
        );
    }

    /// Simulate a foreign connection holding `database` open.
    pub fn add_holder(&self, database: impl Into<String>) {
        let mut state = self.state.lock();
        *state.holders.entry(database.into()).or_insert(0) += 1;
    }

    pub fn holder_count(&self, database: &str) -> u32 {
        self.state.lock().holders.get(database).copied().unwrap_or(0)
    }

    pub fn open_connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn database_version(&self, name: &str) -> Option<u64> {
        self.state.lock().databases.get(name).map(|db| db.version)
    }

    pub fn store_names(&self, database: &str) -> Vec<String> {
        self.state
            .lock()
            .databases
            .get(database)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn store_key_path(&self, database: &str, store: &str) -> Option<Option<String>> {
        self.state
            .lock()
            .databases
            .get(database)
            .and_then(|db| db.stores.get(store))
            .map(|s| s.key_path.clone())
    }

    pub fn store_auto_increment(&self, database: &str, store: &str) -> Option<bool> {
        self.state
            .lock()
            .databases
            .get(database)
            .and_then(|db| db.stores.get(store))
            .map(|s| s.auto_increment)
    }

    pub fn store_entries(&self, database: &str, store: &str) -> Option<StoreDump> {
        self.state
            .lock()
            .databases
            .get(database)
            .and_then(|db| db.stores.get(store))
            .map(|s| s.entries.clone())
    }

    /// Announce a version raise on `name` to every other connection and
    /// report whether anything still blocks it.
    fn resolve_blockers(&self, state: &mut MemState, name: &str) -> bool {
        if !self.config.own_conns_ignore_versionchange {
            state.connections.retain(|_, db| db != name);
        }

        let mut blocked = state.connections.values().any(|db| db == name);

        if state.holders.get(name).copied().unwrap_or(0) > 0 {
            if self.config.holders_cede_on_versionchange {
                state.holders.remove(name);
            } else {
                blocked = true;
                if self.config.holders_cede_after_blocked {
                    state.holders.remove(name);
                }
            }
        }

        blocked
    }

    fn raise_version(
        &self,
        state: &mut MemState,
        conn: ConnId,
        name: &str,
        version: u64,
        create: &[String],
    ) -> OpenOutcome {
        if self.resolve_blockers(state, name) {
            return OpenOutcome::Blocked;
        }

        let db = state.databases.entry(name.to_string()).or_default();
        db.version = version;
        for store in create {
            db.stores.entry(store.clone()).or_insert_with(|| MemStore {
                key_path: None,
                auto_increment: true,
                entries: BTreeMap::new(),
                next_auto_key: 0,
            });
        }
        let outcome = OpenOutcome::Opened {
            version: db.version,
            stores: db.store_infos(),
        };
        state.connections.insert(conn.0, name.to_string());
        outcome
    }

    fn derive_inline_key(store: &mut MemStore, value: &StoredValue) -> Option<String> {
        if let (Some(path), StoredValue::Json(json)) = (&store.key_path, value) {
            if let Some(key) = json.get(path.as_str()) {
                return Some(match key {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        }
        if store.auto_increment {
            store.next_auto_key += 1;
            return Some(store.next_auto_key.to_string());
        }
        None
    }
}

impl Default for MemoryStorageBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBridge for MemoryStorageBridge {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, StorageError> {
        if self.config.fail_list {
            return Err(StorageError::Op("database listing failed".to_string()));
        }
        let state = self.state.lock();
        Ok(state
            .databases
            .iter()
            .map(|(name, db)| DatabaseInfo {
                name: name.clone(),
                version: Some(db.version),
            })
            .collect())
    }

    async fn open_database(
        &self,
        conn: ConnId,
        name: &str,
        version: Option<u64>,
    ) -> Result<OpenOutcome, StorageError> {
        let mut state = self.state.lock();
        let current = state.databases.get(name).map(|db| db.version).unwrap_or(0);

        match version {
            // Version-less probe: create-on-missing at version 1.
            None => {
                let db = state.databases.entry(name.to_string()).or_default();
                if db.version == 0 {
                    db.version = 1;
                }
                let outcome = OpenOutcome::Opened {
                    version: db.version,
                    stores: db.store_infos(),
                };
                state.connections.insert(conn.0, name.to_string());
                Ok(outcome)
            }
            Some(v) if v < current => Err(StorageError::Op(format!(
                "VersionError: requested version {v} is below current version {current}"
            ))),
            Some(v) if v == current => {
                let db = state
                    .databases
                    .get(name)
                    .ok_or_else(|| StorageError::Op(format!("database {name} not found")))?;
                let outcome = OpenOutcome::Opened {
                    version: db.version,
                    stores: db.store_infos(),
                };
                state.connections.insert(conn.0, name.to_string());
                Ok(outcome)
            }
            Some(v) => Ok(self.raise_version(&mut state, conn, name, v, &[])),
        }
    }

    async fn upgrade_database(
        &self,
        conn: ConnId,
        name: &str,
        version: u64,
        missing_stores: &[String],
    ) -> Result<OpenOutcome, StorageError> {
        let mut state = self.state.lock();
        let current = state.databases.get(name).map(|db| db.version).unwrap_or(0);
        if version <= current {
            return Err(StorageError::Op(format!(
                "VersionError: upgrade to {version} does not raise current version {current}"
            )));
        }
        Ok(self.raise_version(&mut state, conn, name, version, missing_stores))
    }

    async fn read_store(&self, conn: ConnId, store: &str) -> Result<StoreDump, StorageError> {
        if self.config.fail_read_stores.contains(store) {
            return Err(StorageError::Op(format!(
                "read transaction failed on store {store}"
            )));
        }
        let state = self.state.lock();
        let database = state
            .connections
            .get(&conn.0)
            .ok_or(StorageError::UnknownConnection(conn))?;
        state
            .databases
            .get(database)
            .and_then(|db| db.stores.get(store))
            .map(|s| s.entries.clone())
            .ok_or_else(|| StorageError::Op(format!("NotFoundError: store {store} not found")))
    }

    async fn write_store(
        &self,
        conn: ConnId,
        store: &str,
        entries: &StoreDump,
    ) -> Result<WriteOutcome, StorageError> {
        if self.config.fail_write_stores.contains(store) {
            return Err(StorageError::Op(format!(
                "AbortError: write transaction aborted on store {store}"
            )));
        }

        let mut state = self.state.lock();
        let database = state
            .connections
            .get(&conn.0)
            .cloned()
            .ok_or(StorageError::UnknownConnection(conn))?;
        let mem_store = state
            .databases
            .get_mut(&database)
            .and_then(|db| db.stores.get_mut(store))
            .ok_or_else(|| StorageError::Op(format!("NotFoundError: store {store} not found")))?;

        let failing_keys = self.config.fail_item_keys.get(store);
        let mut outcome = WriteOutcome::default();
        for (key, value) in entries {
            if failing_keys.is_some_and(|keys| keys.contains(key)) {
                outcome.errors.push(ItemFailure {
                    key: Some(key.clone()),
                    message: "write rejected".to_string(),
                });
                continue;
            }

            if mem_store.key_path.is_none() {
                mem_store.entries.insert(key.clone(), value.clone());
                outcome.applied += 1;
            } else {
                match Self::derive_inline_key(mem_store, value) {
                    Some(inline_key) => {
                        mem_store.entries.insert(inline_key, value.clone());
                        outcome.applied += 1;
                    }
                    None => outcome.errors.push(ItemFailure {
                        key: Some(key.clone()),
                        message: "DataError: no key could be derived from value".to_string(),
                    }),
                }
            }
        }
        Ok(outcome)
    }

    async fn close(&self, conn: ConnId) -> Result<(), StorageError> {
        self.state.lock().connections.remove(&conn.0);
        Ok(())
    }
}
