use async_trait::async_trait;

use crate::browser::PageDriver;
use crate::storage::bridge::{
    ConnId, DatabaseInfo, OpenOutcome, StorageBridge, StorageError, WriteOutcome,
};
use crate::storage::dump::StoreDump;
use crate::storage::scripts;

/// Storage bridge backed by a live page.
///
/// Each operation evaluates one script from [`scripts`] in the page and
/// decodes its result envelope. Connections live in the page's registry, so
/// the bridge itself is stateless.
pub struct WebStorageBridge<'a, P: PageDriver + ?Sized> {
    page: &'a P,
}

impl<'a, P: PageDriver + ?Sized> WebStorageBridge<'a, P> {
    pub fn new(page: &'a P) -> Self {
        Self { page }
    }

    async fn run(&self, script: &str) -> Result<serde_json::Value, StorageError> {
        let raw = self.page.evaluate(script).await?;
        scripts::unwrap_reply(raw)
    }
}

#[async_trait]
impl<'a, P: PageDriver + ?Sized> StorageBridge for WebStorageBridge<'a, P> {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, StorageError> {
        let value = self.run(scripts::list_databases()).await?;
        serde_json::from_value(value)
            .map_err(|err| StorageError::Protocol(format!("malformed database list: {err}")))
    }

    async fn open_database(
        &self,
        conn: ConnId,
        name: &str,
        version: Option<u64>,
    ) -> Result<OpenOutcome, StorageError> {
        let value = self.run(&scripts::open_database(conn, name, version)).await?;
        scripts::parse_open_outcome(value)
    }

    async fn upgrade_database(
        &self,
        conn: ConnId,
        name: &str,
        version: u64,
        missing_stores: &[String],
    ) -> Result<OpenOutcome, StorageError> {
        let script = scripts::upgrade_database(conn, name, version, missing_stores);
        let value = self.run(&script).await?;
        scripts::parse_open_outcome(value)
    }

    async fn read_store(&self, conn: ConnId, store: &str) -> Result<StoreDump, StorageError> {
        let value = self.run(&scripts::read_store(conn, store)).await?;
        serde_json::from_value(value)
            .map_err(|err| StorageError::Protocol(format!("malformed store dump: {err}")))
    }

    async fn write_store(
        &self,
        conn: ConnId,
        store: &str,
        entries: &StoreDump,
    ) -> Result<WriteOutcome, StorageError> {
        let value = self.run(&scripts::write_store(conn, store, entries)).await?;
        serde_json::from_value(value)
            .map_err(|err| StorageError::Protocol(format!("malformed write outcome: {err}")))
    }

    async fn close(&self, conn: ConnId) -> Result<(), StorageError> {
        self.run(&scripts::close_connection(conn)).await?;
        Ok(())
    }
}
