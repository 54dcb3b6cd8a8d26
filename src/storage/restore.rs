//! Restore engine for structured storage
//!
//! Replays captured database dumps into a live page. One attempt runs the
//! full pipeline: navigate to the capture origin, then per database probe
//! the live schema, repair drift through a version-upgrade open, write
//! every store through its own transaction, and finally drain all
//! engine-opened connections and reload the page. Any fatal step failure
//! aborts the attempt and the whole pipeline is retried under a bounded
//! policy; store and item level failures are aggregated on the report
//! instead of failing the attempt.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use thiserror::Error;

use crate::browser::{BrowserError, PageDriver};
use crate::storage::arena::ConnectionArena;
use crate::storage::bridge::{ConnId, OpenOutcome, StorageBridge, StorageError, StoreInfo};
use crate::storage::dump::DatabaseDump;

/// Retry policy for the restore pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RestoreOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// One store that could not be fully written during an otherwise
/// successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub database: String,
    pub store: String,
    pub message: String,
}

/// Outcome of a successful restore.
///
/// `store_failures` carries the aggregated non-fatal errors of the final
/// attempt; partial restoration is reported, never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub attempts: u32,
    pub databases: u64,
    pub stores_applied: u64,
    pub entries_applied: u64,
    pub store_failures: Vec<StoreFailure>,
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("navigation to {url} failed")]
    Navigate {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("invalid dump for database {0}")]
    InvalidDump(String, #[source] serde_json::Error),

    #[error("failed to open database {0}")]
    Open(String, #[source] StorageError),

    #[error("database {0} is still blocked after closing this engine's connections")]
    StillBlocked(String),

    #[error("page reload failed")]
    Reload(#[source] BrowserError),

    #[error("restore failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<RestoreError>,
    },
}

enum OpenRequest<'a> {
    /// Version-less open, discovers the live store set.
    Probe,
    /// Open one version above the live one and create the named stores
    /// inside the upgrade transaction.
    Upgrade { version: u64, missing: &'a [String] },
}

/// Drives one snapshot's structured databases into a live page.
pub struct RestoreEngine<'a, P: ?Sized, B: ?Sized> {
    page: &'a P,
    bridge: &'a B,
    options: RestoreOptions,
}

impl<'a, P, B> RestoreEngine<'a, P, B>
where
    P: PageDriver + ?Sized,
    B: StorageBridge + ?Sized,
{
    pub fn new(page: &'a P, bridge: &'a B) -> Self {
        Self {
            page,
            bridge,
            options: RestoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RestoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Restore every dump in `dumps` (keyed by database name) against the
    /// origin at `url`, retrying the whole pipeline on fatal failures.
    pub async fn restore(
        &self,
        url: &str,
        dumps: &BTreeMap<String, String>,
    ) -> Result<RestoreReport, RestoreError> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(attempt, max_attempts, "starting restore attempt");

            match self.run_attempt(url, dumps).await {
                Ok(mut report) => {
                    report.attempts = attempt;
                    if !report.store_failures.is_empty() {
                        tracing::warn!(
                            failures = report.store_failures.len(),
                            "restore completed with store errors"
                        );
                    }
                    return Ok(report);
                }
                Err(err) if attempt >= max_attempts => {
                    return Err(RestoreError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "restore attempt failed, retrying");
                    tokio::time::sleep(self.options.retry_delay).await;
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        url: &str,
        dumps: &BTreeMap<String, String>,
    ) -> Result<RestoreReport, RestoreError> {
        let mut arena = ConnectionArena::new();
        let result = self.attempt_inner(url, dumps, &mut arena).await;

        // Every attempt leaves no connection behind, success or failure,
        // so a retry never contends with its predecessor.
        arena.drain(self.bridge).await;

        let report = result?;
        self.page.reload().await.map_err(RestoreError::Reload)?;
        Ok(report)
    }

    async fn attempt_inner(
        &self,
        url: &str,
        dumps: &BTreeMap<String, String>,
        arena: &mut ConnectionArena,
    ) -> Result<RestoreReport, RestoreError> {
        self.page
            .navigate(url)
            .await
            .map_err(|source| RestoreError::Navigate {
                url: url.to_string(),
                source,
            })?;

        let mut report = RestoreReport::default();
        for (name, raw) in dumps {
            let dump = DatabaseDump::parse(raw)
                .map_err(|err| RestoreError::InvalidDump(name.clone(), err))?;
            self.restore_database(name, &dump, arena, &mut report).await?;
            report.databases += 1;
        }
        Ok(report)
    }

    async fn restore_database(
        &self,
        name: &str,
        dump: &DatabaseDump,
        arena: &mut ConnectionArena,
        report: &mut RestoreReport,
    ) -> Result<(), RestoreError> {
        let probe = arena.allocate(name);
        let (live_version, live_stores) = self
            .open_with_recovery(probe, name, &OpenRequest::Probe, arena)
            .await?;

        let live_names: BTreeSet<&str> = live_stores.iter().map(|s| s.name.as_str()).collect();
        let missing: Vec<String> = dump
            .stores
            .keys()
            .filter(|store| !live_names.contains(store.as_str()))
            .cloned()
            .collect();

        let write_conn = if missing.is_empty() {
            probe
        } else {
            // Store creation is only legal inside a version-upgrade
            // transaction, so reopen one version above the live one. The
            // probe connection cedes via its versionchange handler.
            let upgrade = arena.allocate(name);
            let request = OpenRequest::Upgrade {
                version: live_version + 1,
                missing: &missing,
            };
            let (version, _) = self.open_with_recovery(upgrade, name, &request, arena).await?;
            tracing::info!(database = name, version, created = missing.len(), "repaired schema drift");
            upgrade
        };

        for (store, entries) in &dump.stores {
            match self.bridge.write_store(write_conn, store, entries).await {
                Ok(outcome) => {
                    report.stores_applied += 1;
                    report.entries_applied += outcome.applied;
                    tracing::debug!(database = name, store, applied = outcome.applied, "store written");
                    for item in outcome.errors {
                        report.store_failures.push(StoreFailure {
                            database: name.to_string(),
                            store: store.clone(),
                            message: match item.key {
                                Some(key) => format!("key {key:?}: {}", item.message),
                                None => item.message,
                            },
                        });
                    }
                }
                Err(err) => {
                    // One failed store must not take down the rest of the
                    // attempt.
                    tracing::warn!(database = name, store, error = %err, "store write failed");
                    report.store_failures.push(StoreFailure {
                        database: name.to_string(),
                        store: store.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    async fn open_request(
        &self,
        conn: ConnId,
        name: &str,
        request: &OpenRequest<'_>,
    ) -> Result<OpenOutcome, StorageError> {
        match request {
            OpenRequest::Probe => self.bridge.open_database(conn, name, None).await,
            OpenRequest::Upgrade { version, missing } => {
                self.bridge.upgrade_database(conn, name, *version, missing).await
            }
        }
    }

    /// Run an open, and when it reports Blocked close every connection
    /// this engine holds on the same database, then retry once.
    async fn open_with_recovery(
        &self,
        conn: ConnId,
        name: &str,
        request: &OpenRequest<'_>,
        arena: &mut ConnectionArena,
    ) -> Result<(u64, Vec<StoreInfo>), RestoreError> {
        match self
            .open_request(conn, name, request)
            .await
            .map_err(|err| RestoreError::Open(name.to_string(), err))?
        {
            OpenOutcome::Opened { version, stores } => return Ok((version, stores)),
            OpenOutcome::Blocked => {}
        }

        let own: Vec<ConnId> = arena
            .matching(name)
            .into_iter()
            .filter(|held| *held != conn)
            .collect();
        tracing::warn!(
            database = name,
            held = own.len(),
            "open blocked, closing this engine's connections"
        );
        for held in own {
            if let Err(err) = self.bridge.close(held).await {
                tracing::warn!(conn = %held, error = %err, "failed to close blocking connection");
            }
            arena.release(held);
        }

        match self
            .open_request(conn, name, request)
            .await
            .map_err(|err| RestoreError::Open(name.to_string(), err))?
        {
            OpenOutcome::Opened { version, stores } => Ok((version, stores)),
            OpenOutcome::Blocked => Err(RestoreError::StillBlocked(name.to_string())),
        }
    }
}
