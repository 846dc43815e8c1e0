//! Fetch daily snapshots into the local store
//!
//! Usage:
//!   backfill [--from YYYY-MM-DD] [--to YYYY-MM-DD]
//!   backfill --latest
//!
//! Defaults to the last 7 days ending today. `--latest` stores only the
//! source's rolling `latest.json`.
//!
//! Environment variables:
//!   SNAPSHOT_SOURCE_URL - Base URL of daily aggregates
//!   BACKFILL_BATCH_SIZE - Concurrent requests per batch (default: 5)

use chrono::{Days, Local, NaiveDate};
use dotenv::dotenv;
use log::info;
use skiflow::config::ServiceConfig;
use skiflow::fetcher::{date_range, SnapshotFetcher};
use skiflow::store::{SqliteStore, TimeSeriesStore};
use std::env;
use std::sync::Arc;

const DEFAULT_DAYS: u64 = 7;

fn date_flag(args: &[String], flag: &str) -> Result<Option<NaiveDate>, Box<dyn std::error::Error>> {
    match args.windows(2).find(|w| w[0] == flag) {
        Some(w) => NaiveDate::parse_from_str(&w[1], "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("Invalid {} date: {}", flag, w[1]).into()),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = ServiceConfig::from_env();

    let store = Arc::new(SqliteStore::open(&config.db_path, &config.schema_dir)?);
    let fetcher = SnapshotFetcher::new(&config.snapshot_source_url)?;

    info!("📥 Snapshot source: {}", config.snapshot_source_url);

    if args.iter().any(|a| a == "--latest") {
        let snapshot = fetcher.fetch_latest().await?;
        store.put_snapshot(&snapshot)?;
        info!("✅ Stored latest snapshot ({})", snapshot.date);
        return Ok(());
    }

    let to = date_flag(&args, "--to")?.unwrap_or_else(|| Local::now().date_naive());
    let from = match date_flag(&args, "--from")? {
        Some(from) => from,
        None => to
            .checked_sub_days(Days::new(DEFAULT_DAYS - 1))
            .ok_or("Date out of range")?,
    };
    if from > to {
        return Err(format!("--from ({}) is after --to ({})", from, to).into());
    }

    let dates = date_range(from, to);
    let report = fetcher
        .backfill(store.clone(), &dates, config.backfill_batch_size)
        .await;

    let coverage = store.coverage()?;
    info!("📊 Store now holds {} snapshot days", coverage.total_days);

    if report.successful == 0 && report.total > 0 {
        return Err("No snapshots could be fetched".into());
    }
    Ok(())
}
