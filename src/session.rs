//! Session capture and restore orchestration
//!
//! Ties the collaborators together: cookies and localStorage are single
//! flat read/write calls against the page, the structured databases go
//! through the capture pass and the restore engine. Flat-state failures
//! are immediate; only the structured restore runs under the retry policy.

use thiserror::Error;

use crate::browser::{BrowserError, PageDriver};
use crate::snapshot::{OriginState, Snapshot};
use crate::storage::{
    capture_databases, scripts, CaptureError, RestoreEngine, RestoreError, RestoreOptions,
    RestoreReport, StorageError, WebStorageBridge,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error("snapshot has structured databases but no origin URL")]
    MissingOriginUrl,

    #[error("malformed page reply: {0}")]
    Protocol(String),
}

/// What a restore applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreOutcome {
    pub cookies_applied: usize,
    pub origins_applied: usize,
    pub storage_items_applied: u64,
    /// Structured-store report; `None` when the snapshot carried no
    /// database dumps.
    pub report: Option<RestoreReport>,
}

/// Capture the full session state visible from the page's current origin.
pub async fn capture_session<P>(page: &P) -> Result<Snapshot, SessionError>
where
    P: PageDriver + ?Sized,
{
    let url = page.current_url().await?;
    tracing::info!(url = %url, "capturing session state");

    let cookies = page.cookies().await?;
    tracing::debug!(cookies = cookies.len(), "cookies read");

    let raw = page.evaluate(scripts::read_local_storage()).await?;
    let value = scripts::unwrap_reply(raw)?;
    let origin: OriginState = serde_json::from_value(value)
        .map_err(|err| SessionError::Protocol(format!("malformed localStorage reply: {err}")))?;
    let origins = if origin.local_storage.is_empty() {
        Vec::new()
    } else {
        vec![origin]
    };

    let bridge = WebStorageBridge::new(page);
    let idbs = capture_databases(&bridge).await?;
    tracing::info!(databases = idbs.len(), "structured storage captured");

    Ok(Snapshot {
        cookies,
        origins,
        idbs,
        idbs_url: url,
    })
}

/// Replay a snapshot into a fresh session: cookies first, then each
/// origin's localStorage, then the structured databases under the retry
/// policy in `options`.
pub async fn restore_session<P>(
    page: &P,
    snapshot: &Snapshot,
    options: RestoreOptions,
) -> Result<RestoreOutcome, SessionError>
where
    P: PageDriver + ?Sized,
{
    let mut outcome = RestoreOutcome::default();

    if !snapshot.cookies.is_empty() {
        page.set_cookies(&snapshot.cookies).await?;
        outcome.cookies_applied = snapshot.cookies.len();
        tracing::info!(cookies = outcome.cookies_applied, "cookies restored");
    }

    for origin in &snapshot.origins {
        if origin.local_storage.is_empty() {
            continue;
        }
        // localStorage is origin-partitioned; land on the origin first.
        page.navigate(&origin.origin).await?;
        let script = scripts::write_local_storage(&origin.local_storage);
        let value = scripts::unwrap_reply(page.evaluate(&script).await?)?;
        let written = value
            .as_u64()
            .ok_or_else(|| SessionError::Protocol("malformed localStorage write reply".to_string()))?;

        outcome.origins_applied += 1;
        outcome.storage_items_applied += written;
        tracing::debug!(origin = %origin.origin, items = written, "localStorage restored");
    }

    if !snapshot.idbs.is_empty() {
        if snapshot.idbs_url.is_empty() {
            return Err(SessionError::MissingOriginUrl);
        }
        let bridge = WebStorageBridge::new(page);
        let report = RestoreEngine::new(page, &bridge)
            .with_options(options)
            .restore(&snapshot.idbs_url, &snapshot.idbs)
            .await?;
        outcome.report = Some(report);
    }

    Ok(outcome)
}
