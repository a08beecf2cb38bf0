// 📋 collection-plan - dry run: what would collection-sync add?
// Ingests, fetches and plans, then prints the work list. Never opens a browser.

use anyhow::{Context, Result};
use clap::Parser;
use collection_sync::{
    plan_from_raw, CollectionFetcher, CsvSource, HttpCollectionApi, LogFormat, ReconciliationReport,
    RetryPolicy, RowSource, SkipReason, SyncConfig,
};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Show which CSV rows collection-sync would add, without touching anything",
    long_about = None
)]
struct Cli {
    /// CSV export to check
    csv: PathBuf,

    /// Account whose collection is compared against
    #[arg(short = 'u', long)]
    username: String,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every matcher comparison
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::default(),
    };
    config.log.trace_matching |= cli.verbose;
    init_tracing(cli.verbose, config.log.format);

    let rows = CsvSource::new().read_rows(&cli.csv)?;

    let policy = RetryPolicy::fixed(config.max_pending_retries, config.pending_backoff());
    let mut fetcher = CollectionFetcher::new(HttpCollectionApi::new(config.base_url()), policy);
    let records = fetcher
        .fetch_existing(&cli.username)
        .context("Access to your existing collection failed")?;

    let plan = plan_from_raw(&rows, &records, &config.log);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }

    info!("Dry run complete, nothing was changed");
    Ok(())
}

fn print_plan(plan: &ReconciliationReport) {
    println!("📋 Collection plan ({})", plan.planned_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", plan.summary());

    if plan.is_empty() {
        println!("\n✓ Nothing to add");
    } else {
        println!("\n➕ To add:");
        for (index, item) in plan.work_items.iter().enumerate() {
            let language = item
                .first_preferred_language
                .as_deref()
                .map(|l| format!(" [{}]", l))
                .unwrap_or_default();
            println!(
                "  {:>3}. {} - {}{}",
                index + 1,
                item.entity_id(),
                item.display_label(),
                language
            );
        }
    }

    if !plan.skipped.is_empty() {
        println!("\n⏭️  Skipped:");
        for skipped in &plan.skipped {
            let reason = match skipped.reason {
                SkipReason::AlreadyInCollection => "already in collection",
                SkipReason::DuplicateInInput => "duplicate in CSV",
            };
            println!("  - {} ({}): {}", skipped.entity_id, skipped.entity_name, reason);
        }
    }
}

fn init_tracing(verbose: bool, configured: LogFormat) {
    let filter = EnvFilter::try_from_env("COLLECTION_SYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "collection_sync=debug,collection_plan=debug,info"
        } else {
            "collection_sync=info,collection_plan=info,warn"
        })
    });

    let format = env::var("COLLECTION_SYNC_LOG_FORMAT").unwrap_or_else(|_| match configured {
        LogFormat::Json => "json".to_string(),
        LogFormat::Compact => "compact".to_string(),
    });

    // stdout carries the plan; logs go to stderr
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
