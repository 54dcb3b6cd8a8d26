use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use carryon::browser::ChromeSession;
use carryon::cli::{self, BrowserArgs, Cli, Command};
use carryon::session::{capture_session, restore_session};
use carryon::snapshot::{load_snapshot, save_snapshot, Snapshot};
use carryon::storage::RestoreOptions;
use carryon::{Config, PageDriver};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load();

    match cli.command {
        Command::Capture { url, output, browser } => capture(&config, &url, output, browser).await,
        Command::Restore {
            snapshot,
            wait,
            attempts,
            retry_delay_ms,
            browser,
        } => {
            let options = cli::resolve_restore_options(&config, attempts, retry_delay_ms);
            restore(&config, &snapshot, wait, options, browser).await
        }
        Command::Inspect { snapshot } => inspect(&snapshot),
    }
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn capture(
    config: &Config,
    url: &str,
    output: Option<PathBuf>,
    browser: BrowserArgs,
) -> Result<()> {
    let path = output.unwrap_or_else(|| carryon::util::timestamped_snapshot_path(&config.snapshot_dir));

    let session = ChromeSession::launch(browser.launch_options(config)).await?;
    let result = run_capture(&session, url, &path).await;
    if result.is_err() {
        let _ = session.close().await;
        return result;
    }
    session.close().await?;
    Ok(())
}

async fn run_capture(page: &ChromeSession, url: &str, path: &Path) -> Result<()> {
    page.navigate(url).await?;
    println!("Sign in to the application in the browser window.");
    println!("Press Enter here when the session is ready to capture.");

    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        read = stdin.read_line(&mut line) => {
            read.context("failed to read stdin")?;
        }
        _ = page.wait_for_close() => {
            anyhow::bail!("browser closed before the session was captured");
        }
    }

    let snapshot = capture_session(page).await?;
    save_snapshot(path, &snapshot)?;
    println!("Snapshot written to {}", path.display());
    println!("{}", cli::inspect_summary(&snapshot)?);
    Ok(())
}

async fn restore(
    config: &Config,
    path: &Path,
    wait: bool,
    options: RestoreOptions,
    browser: BrowserArgs,
) -> Result<()> {
    let snapshot = load_snapshot(path)?;

    let session = ChromeSession::launch(browser.launch_options(config)).await?;
    let result = run_restore(&session, &snapshot, options).await;
    if result.is_err() {
        let _ = session.close().await;
        return result;
    }

    if wait {
        println!("Browser left open; close the window to finish.");
        let _ = session.wait_for_close().await;
        let _ = session.close().await;
    } else {
        session.close().await?;
    }
    Ok(())
}

async fn run_restore(
    page: &ChromeSession,
    snapshot: &Snapshot,
    options: RestoreOptions,
) -> Result<()> {
    let outcome = restore_session(page, snapshot, options).await?;

    println!("Cookies applied: {}", outcome.cookies_applied);
    println!(
        "localStorage: {} items across {} origins",
        outcome.storage_items_applied, outcome.origins_applied
    );
    if let Some(report) = &outcome.report {
        println!(
            "Databases: {} restored, {} stores, {} entries (attempt {})",
            report.databases, report.stores_applied, report.entries_applied, report.attempts
        );
        for failure in &report.store_failures {
            eprintln!(
                "warning: {}/{}: {}",
                failure.database, failure.store, failure.message
            );
        }
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let snapshot = load_snapshot(path)?;
    println!("Snapshot: {}", path.display());
    println!("{}", cli::inspect_summary(&snapshot)?);
    Ok(())
}
