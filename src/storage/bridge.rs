use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::browser::BrowserError;
use crate::storage::dump::StoreDump;

/// Identifier for one engine-opened database connection.
///
/// Ids are issued by the engine's connection arena and mapped by the bridge
/// onto whatever holds the live connection (an in-page registry slot for the
/// real bridge, a table entry for the in-memory one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A database visible to the current origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    /// Current schema version, when the engine reports one.
    pub version: Option<u64>,
}

/// One object store in a live database schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub name: String,
    /// Key-path policy; `None` means the store takes explicit keys.
    pub key_path: Option<String>,
}

/// Result of an open or upgrade request.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// The connection is live and registered under the requested id.
    Opened { version: u64, stores: Vec<StoreInfo> },
    /// Another live connection holds the database at a lower version.
    Blocked,
}

/// Result of one store write transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Entries applied before the transaction completed.
    pub applied: u64,
    /// Per-entry failures that did not abort the transaction.
    #[serde(default)]
    pub errors: Vec<ItemFailure>,
}

/// A single entry that failed to apply inside an otherwise live transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: Option<String>,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The page evaluation carrying the operation failed.
    #[error(transparent)]
    Page(#[from] BrowserError),
    /// The in-page operation reported a failure.
    #[error("storage operation failed: {0}")]
    Op(String),
    /// The bridge returned something the engine could not interpret.
    #[error("unexpected bridge reply: {0}")]
    Protocol(String),
    #[error("unknown connection {0}")]
    UnknownConnection(ConnId),
    #[error("dump serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Access to the origin's structured storage at logical-operation
/// granularity.
///
/// Each method covers one request/event exchange with the storage engine
/// and suspends until its completion, error, or blocked signal arrives.
/// Connections persist across calls under engine-issued [`ConnId`]s, so a
/// store can be read or written on a connection opened by an earlier call.
#[async_trait]
pub trait StorageBridge: Send + Sync {
    /// Enumerate the databases visible to the current origin.
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, StorageError>;

    /// Open a database, registering the connection under `conn`.
    ///
    /// A version-less open discovers the live schema (and creates the
    /// database at version 1 when it does not exist yet). Opening at a
    /// version above the current one performs a plain version raise without
    /// creating stores.
    async fn open_database(
        &self,
        conn: ConnId,
        name: &str,
        version: Option<u64>,
    ) -> Result<OpenOutcome, StorageError>;

    /// Open at `version` and create `missing_stores` inside the
    /// version-upgrade transaction. Created stores take explicit keys and
    /// fall back to a synthetic auto-incrementing key (no key path).
    async fn upgrade_database(
        &self,
        conn: ConnId,
        name: &str,
        version: u64,
        missing_stores: &[String],
    ) -> Result<OpenOutcome, StorageError>;

    /// Read a store's full contents through one read-only transaction.
    /// Keys and values are fetched in parallel and zipped; values arrive
    /// already tag-encoded.
    async fn read_store(&self, conn: ConnId, store: &str) -> Result<StoreDump, StorageError>;

    /// Write entries into a store through one read-write transaction.
    ///
    /// Explicit keys are used only when the live store has no key-path
    /// policy. Per-entry failures are collected in the outcome; a
    /// transaction-level failure is an `Err`.
    async fn write_store(
        &self,
        conn: ConnId,
        store: &str,
        entries: &StoreDump,
    ) -> Result<WriteOutcome, StorageError>;

    /// Close the registered connection. Closing an unknown or already
    /// closed connection is a no-op.
    async fn close(&self, conn: ConnId) -> Result<(), StorageError>;
}
