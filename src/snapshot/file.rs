//! Snapshot file persistence
//!
//! Snapshots are stored as pretty-printed JSON. Unlike a cache, a snapshot
//! is the user's data: a missing or corrupt file is an error, never an
//! empty default.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::snapshot::model::Snapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write snapshot {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot")]
    Encode(#[source] serde_json::Error),
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let contents = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let contents = serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Encode)?;
    fs::write(path, contents).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "snapshot written");
    Ok(())
}
