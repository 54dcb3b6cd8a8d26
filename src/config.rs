//! Tool configuration
//!
//! Built-in defaults merged with an optional TOML file at
//! `~/.carryon/config.toml`. CLI flags win over file values, file values
//! over built-ins. A missing or malformed file falls back to defaults; an
//! example config is written on first run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::storage::RestoreOptions;
use crate::util::{config_path, default_snapshot_dir};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Browser binary override; PATH discovery when unset.
    pub browser_binary: Option<PathBuf>,
    pub headless: bool,
    /// Directory `capture` writes snapshots into by default.
    pub snapshot_dir: PathBuf,
    /// Browser profile directory; throwaway profile when unset.
    pub user_data_dir: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_binary: None,
            headless: false,
            snapshot_dir: default_snapshot_dir(),
            user_data_dir: None,
            retry_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub browser_binary: Option<PathBuf>,
    pub headless: Option<bool>,
    pub snapshot_dir: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl Config {
    /// Load configuration from the default file, merging with defaults.
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::from_path(&config_file)
    }

    /// Merge the file at `path` over the defaults.
    pub fn from_path(path: &Path) -> Self {
        let mut config = Config::default();
        if let Ok(contents) = fs::read_to_string(path) {
            match toml::from_str::<TomlConfig>(&contents) {
                Ok(toml_config) => config.apply(toml_config),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "ignoring malformed config file");
                }
            }
        }
        config
    }

    fn apply(&mut self, toml_config: TomlConfig) {
        if let Some(browser_binary) = toml_config.browser_binary {
            self.browser_binary = Some(browser_binary);
        }
        if let Some(headless) = toml_config.headless {
            self.headless = headless;
        }
        if let Some(snapshot_dir) = toml_config.snapshot_dir {
            self.snapshot_dir = snapshot_dir;
        }
        if let Some(user_data_dir) = toml_config.user_data_dir {
            self.user_data_dir = Some(user_data_dir);
        }
        if let Some(retry_attempts) = toml_config.retry_attempts {
            self.retry_attempts = retry_attempts;
        }
        if let Some(retry_delay_ms) = toml_config.retry_delay_ms {
            self.retry_delay_ms = retry_delay_ms;
        }
    }

    /// Retry policy for the structured-store restore.
    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions::default()
            .with_max_attempts(self.retry_attempts)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(err) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %err, "failed to create config directory");
                    return;
                }
            }
        }
        if let Err(err) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %err, "failed to write default config");
        }
    }
}
