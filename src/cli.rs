//! Command-line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::browser::LaunchOptions;
use crate::config::Config;
use crate::snapshot::Snapshot;
use crate::storage::RestoreOptions;

/// Capture a browser session's cookies, localStorage, and IndexedDB
/// databases into a snapshot file, and replay it into a fresh browser.
#[derive(Parser, Debug)]
#[command(name = "carryon", version, about)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a browser, sign in by hand, then write the session snapshot
    Capture {
        /// URL to open for establishing the session
        url: String,

        /// Snapshot file to write (a timestamped file in the snapshot
        /// directory when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Launch a browser and replay a snapshot into it
    Restore {
        /// Snapshot file to replay
        snapshot: PathBuf,

        /// Keep the browser open until it is closed by hand
        #[arg(long)]
        wait: bool,

        /// Maximum attempts for the structured-store restore
        #[arg(long)]
        attempts: Option<u32>,

        /// Delay between attempts, in milliseconds
        #[arg(long)]
        retry_delay_ms: Option<u64>,

        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Summarize a snapshot file without launching a browser
    Inspect {
        /// Snapshot file to summarize
        snapshot: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct BrowserArgs {
    /// Browser binary to launch (PATH discovery by default)
    #[arg(long)]
    pub browser: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Force a visible window even if the config says headless
    #[arg(long, conflicts_with = "headless")]
    pub headed: bool,

    /// Browser profile directory (throwaway profile by default)
    #[arg(long)]
    pub user_data_dir: Option<PathBuf>,
}

impl BrowserArgs {
    /// Fold the flags over config file values; flags win.
    pub fn launch_options(&self, config: &Config) -> LaunchOptions {
        let headless = if self.headless {
            true
        } else if self.headed {
            false
        } else {
            config.headless
        };

        let mut options = LaunchOptions::default().with_headless(headless);
        if let Some(binary) = self.browser.clone().or_else(|| config.browser_binary.clone()) {
            options = options.with_executable(binary);
        }
        if let Some(dir) = self
            .user_data_dir
            .clone()
            .or_else(|| config.user_data_dir.clone())
        {
            options = options.with_user_data_dir(dir);
        }
        options
    }
}

/// Retry policy from config defaults with per-invocation overrides.
pub fn resolve_restore_options(
    config: &Config,
    attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
) -> RestoreOptions {
    let mut options = config.restore_options();
    if let Some(attempts) = attempts {
        options = options.with_max_attempts(attempts);
    }
    if let Some(delay) = retry_delay_ms {
        options = options.with_retry_delay(std::time::Duration::from_millis(delay));
    }
    options
}

/// Human-readable summary of a snapshot, one section per state layer.
pub fn inspect_summary(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    let dumps = snapshot.database_dumps()?;
    let mut lines = Vec::new();

    if snapshot.idbs_url.is_empty() {
        lines.push("Origin URL: (none)".to_string());
    } else {
        lines.push(format!("Origin URL: {}", snapshot.idbs_url));
    }

    let session = snapshot.cookies.iter().filter(|c| c.is_session()).count();
    let horizon = snapshot
        .cookies
        .iter()
        .filter(|c| !c.is_session())
        .map(|c| c.expires)
        .fold(f64::NEG_INFINITY, f64::max);
    if horizon.is_finite() {
        let date = chrono::DateTime::from_timestamp(horizon as i64, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "overflow".to_string());
        lines.push(format!(
            "Cookies: {} ({} session, expire through {})",
            snapshot.cookies.len(),
            session,
            date
        ));
    } else {
        lines.push(format!(
            "Cookies: {} ({} session)",
            snapshot.cookies.len(),
            session
        ));
    }

    lines.push(format!("Origins: {}", snapshot.origins.len()));
    for origin in &snapshot.origins {
        lines.push(format!(
            "  {}: {} localStorage items",
            origin.origin,
            origin.local_storage.len()
        ));
    }

    lines.push(format!("Databases: {}", dumps.len()));
    for (name, dump) in &dumps {
        lines.push(format!(
            "  {} (version {}): {} stores, {} entries",
            name,
            dump.version,
            dump.stores.len(),
            dump.entry_count()
        ));
        for (store, entries) in &dump.stores {
            lines.push(format!("    {}: {} entries", store, entries.len()));
        }
    }

    Ok(lines.join("\n"))
}
