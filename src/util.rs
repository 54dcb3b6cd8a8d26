//! Path and naming helpers for the carryon data directory

use std::path::{Path, PathBuf};

/// Base data directory (~/.carryon).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".carryon"))
        .unwrap_or_else(|| PathBuf::from(".carryon"))
}

/// Config file path (~/.carryon/config.toml).
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Default directory snapshot files land in (~/.carryon/snapshots).
pub fn default_snapshot_dir() -> PathBuf {
    data_dir().join("snapshots")
}

/// Timestamped snapshot file name inside `dir`.
pub fn timestamped_snapshot_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("session-{stamp}.json"))
}
