//! Connection arena
//!
//! Explicit pool of the connections one capture or restore attempt has
//! opened. The engine allocates an id per open, records which database it
//! belongs to, and drains the whole pool at the attempt boundary so no
//! connection outlives its attempt.

use crate::storage::bridge::{ConnId, StorageBridge};

#[derive(Debug, Default)]
pub struct ConnectionArena {
    next_id: u64,
    open: Vec<(ConnId, String)>,
}

impl ConnectionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a connection to `database` and start tracking it.
    pub fn allocate(&mut self, database: &str) -> ConnId {
        self.next_id += 1;
        let conn = ConnId(self.next_id);
        self.open.push((conn, database.to_string()));
        conn
    }

    /// Stop tracking `conn` without closing it.
    pub fn release(&mut self, conn: ConnId) {
        self.open.retain(|(id, _)| *id != conn);
    }

    /// Ids of tracked connections belonging to `database`.
    pub fn matching(&self, database: &str) -> Vec<ConnId> {
        self.open
            .iter()
            .filter(|(_, db)| db == database)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Close every tracked connection and clear the pool.
    ///
    /// Close failures are logged and skipped: the pool must be empty when
    /// this returns no matter what, and close is idempotent on the bridge
    /// side.
    pub async fn drain<B: StorageBridge + ?Sized>(&mut self, bridge: &B) {
        for (conn, database) in self.open.drain(..) {
            if let Err(err) = bridge.close(conn).await {
                tracing::warn!(%conn, database = %database, error = %err, "failed to close connection while draining");
            }
        }
    }
}
