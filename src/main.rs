// 🎲 collection-sync - bring an online collection in line with a CSV export
//
// Pipeline: CSV → normalize → fetch existing → plan → login → converge each item.

use anyhow::{Context, Result};
use clap::Parser;
use collection_sync::{
    login, plan_from_raw, CollectionFetcher, CsvSource, HttpCollectionApi, LogFormat, RetryPolicy,
    RowSource, SessionGuard, SyncConfig, SyncRunner, WebDriverSession,
};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sync a board game collection CSV export into your online collection",
    long_about = None
)]
struct Cli {
    /// CSV export to import
    csv: PathBuf,

    /// Account username
    #[arg(short = 'u', long)]
    username: String,

    /// Account password
    #[arg(short = 'p', long)]
    password: String,

    /// Drive Firefox instead of Chrome
    #[arg(long)]
    firefox: bool,

    /// Run the browser headed and leave it open afterwards
    #[arg(long)]
    show_browser: bool,

    /// JSON configuration file (timeouts, endpoints, log switches)
    #[arg(long)]
    config: Option<PathBuf>,

    /// WebDriver endpoint, overrides the config file
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Log every matcher comparison and UI step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(cli.verbose, config.log.format);

    // 1. Desired state
    info!(path = %cli.csv.display(), "Parsing CSV");
    let rows = CsvSource::new().read_rows(&cli.csv)?;
    if rows.is_empty() {
        info!("No records parsed from CSV. Exiting.");
        return Ok(());
    }
    info!(records = rows.len(), "Parsed records");

    // 2. Existing state
    let policy = RetryPolicy::fixed(config.max_pending_retries, config.pending_backoff());
    let mut fetcher = CollectionFetcher::new(HttpCollectionApi::new(config.base_url()), policy);
    let records = fetcher
        .fetch_existing(&cli.username)
        .context("Access to your existing collection failed")?;

    // 3. Plan
    let plan = plan_from_raw(&rows, &records, &config.log);
    if plan.is_empty() {
        info!("No new items to add after filtering.");
        return Ok(());
    }

    // 4. Converge
    let session = WebDriverSession::start(&config).context("Failed to start browser session")?;
    let mut guard = SessionGuard::new(Box::new(session), config.show_browser);

    login(guard.session(), &config, &cli.username, &cli.password)?;

    let runner = SyncRunner::new(config.clone());
    let summary = runner.run(guard.session(), &plan.work_items);

    if guard.keep_open() {
        let url = config.user_collection_url(&cli.username);
        if let Err(e) = guard.session().navigate(&url) {
            warn!(error = %e, "Could not open collection page");
        }
    }
    guard.release();

    info!(
        processed = summary.processed,
        verified = summary.verified,
        skipped = summary.skipped,
        failed = summary.failed,
        "Finished run"
    );
    if summary.failed > 0 {
        warn!(ids = ?summary.failed_ids(), "Some items could not be added");
    }

    Ok(())
}

/// Config file (if any) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::default(),
    };

    config.firefox |= cli.firefox;
    config.show_browser |= cli.show_browser;
    if let Some(url) = &cli.webdriver_url {
        config.webdriver_url = url.clone();
    }
    if cli.verbose {
        config.log.trace_matching = true;
        config.log.trace_steps = true;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(verbose: bool, configured: LogFormat) {
    let filter = EnvFilter::try_from_env("COLLECTION_SYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "collection_sync=debug,info"
        } else {
            "collection_sync=info,warn"
        })
    });

    let format = env::var("COLLECTION_SYNC_LOG_FORMAT").unwrap_or_else(|_| match configured {
        LogFormat::Json => "json".to_string(),
        LogFormat::Compact => "compact".to_string(),
    });

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}
