//! Capture pass over structured storage
//!
//! Walks every database the page reports, opens each at its reported
//! version, and reads the full contents of every store into a
//! [`DatabaseDump`]. Capture is fail fast: any database that cannot be
//! opened or read aborts the pass, so a snapshot never carries a silently
//! truncated dump.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::storage::arena::ConnectionArena;
use crate::storage::bridge::{OpenOutcome, StorageBridge, StorageError};
use crate::storage::dump::DatabaseDump;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("database {0} is held open by another connection")]
    Blocked(String),

    #[error("failed to encode dump for database {0}")]
    Encode(String, #[source] serde_json::Error),
}

/// Read every database on the current page into its string dump form,
/// keyed by database name.
///
/// Databases are opened at the version the page reports, which never
/// triggers an upgrade. All connections are closed before returning, on
/// the error paths too.
pub async fn capture_databases<B>(bridge: &B) -> Result<BTreeMap<String, String>, CaptureError>
where
    B: StorageBridge + ?Sized,
{
    let mut arena = ConnectionArena::new();
    let result = capture_inner(bridge, &mut arena).await;
    arena.drain(bridge).await;
    result
}

async fn capture_inner<B>(
    bridge: &B,
    arena: &mut ConnectionArena,
) -> Result<BTreeMap<String, String>, CaptureError>
where
    B: StorageBridge + ?Sized,
{
    let databases = bridge.list_databases().await?;
    let mut dumps = BTreeMap::new();

    for info in databases {
        let conn = arena.allocate(&info.name);
        let outcome = bridge.open_database(conn, &info.name, info.version).await?;
        let (version, stores) = match outcome {
            OpenOutcome::Opened { version, stores } => (version, stores),
            OpenOutcome::Blocked => return Err(CaptureError::Blocked(info.name)),
        };

        let mut dump = DatabaseDump::new(&info.name, version);
        for store in &stores {
            let entries = bridge.read_store(conn, &store.name).await?;
            dump.stores.insert(store.name.clone(), entries);
        }

        bridge.close(conn).await?;
        arena.release(conn);

        tracing::debug!(
            database = %info.name,
            version,
            stores = stores.len(),
            entries = dump.entry_count(),
            "captured database"
        );

        let encoded = dump
            .encode()
            .map_err(|err| CaptureError::Encode(info.name.clone(), err))?;
        dumps.insert(info.name, encoded);
    }

    Ok(dumps)
}
