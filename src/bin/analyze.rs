//! Print the analysis for one date
//!
//! Usage:
//!   analyze [YYYY-MM-DD] [--json]
//!
//! Without a date, the most recent stored snapshot is analyzed. The default
//! output is the plain-text prompt block; `--json` prints the full
//! `DayAnalysis` instead.

use chrono::NaiveDate;
use dotenv::dotenv;
use skiflow::analysis::{format_for_prompt, RankingEngine};
use skiflow::config::ServiceConfig;
use skiflow::store::{SqliteStore, TimeSeriesStore};
use std::env;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let as_json = args.iter().any(|a| a == "--json");
    let date_arg = args.iter().find(|a| !a.starts_with("--"));

    let config = ServiceConfig::from_env();
    let store = Arc::new(SqliteStore::open(&config.db_path, &config.schema_dir)?);

    let date = match date_arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date '{}'. Usage: analyze [YYYY-MM-DD] [--json]", s))?,
        None => store
            .coverage()?
            .last
            .ok_or("No snapshots stored. Run the backfill binary first.")?,
    };

    let engine = RankingEngine::new(store);
    let analysis = engine.analyze(date)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", format_for_prompt(&analysis));
    }

    Ok(())
}
