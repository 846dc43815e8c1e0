//! Service configuration from environment variables

use crate::scheduler::{ConfigError, ScheduleConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./data/skiflow.db";
pub const DEFAULT_SCHEMA_DIR: &str = "sql";
pub const DEFAULT_SNAPSHOT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/jacobschulman/ski-run-scraper-data/main/data/aggregates";

/// Configuration for the skiflow binaries
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the `.sql` schema files
    pub schema_dir: String,

    /// Base URL of the daily aggregate documents
    pub snapshot_source_url: String,

    /// Publish endpoint; the scheduler is disabled when unset
    pub webhook_url: Option<String>,

    pub post_interval_hours: f64,
    pub post_start_hour: u32,
    pub post_end_hour: u32,

    /// Scheduler tick interval in seconds
    pub poll_secs: u64,

    /// Concurrent requests per backfill batch
    pub backfill_batch_size: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SKIFLOW_DB_PATH` (default: ./data/skiflow.db)
    /// - `SKIFLOW_SCHEMA_DIR` (default: sql)
    /// - `SNAPSHOT_SOURCE_URL` (default: scraper aggregates on GitHub)
    /// - `PUBLISH_WEBHOOK_URL` (default: unset)
    /// - `POST_INTERVAL_HOURS` (default: 1.5)
    /// - `POST_START_HOUR` (default: 9)
    /// - `POST_END_HOUR` (default: 21)
    /// - `SCHEDULER_POLL_SECS` (default: 60)
    /// - `BACKFILL_BATCH_SIZE` (default: 5)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            db_path: lookup("SKIFLOW_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),

            schema_dir: lookup("SKIFLOW_SCHEMA_DIR")
                .unwrap_or_else(|| DEFAULT_SCHEMA_DIR.to_string()),

            snapshot_source_url: lookup("SNAPSHOT_SOURCE_URL")
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_SOURCE_URL.to_string()),

            webhook_url: lookup("PUBLISH_WEBHOOK_URL").filter(|s| !s.trim().is_empty()),

            post_interval_hours: parse_var(&lookup, "POST_INTERVAL_HOURS").unwrap_or(1.5),
            post_start_hour: parse_var(&lookup, "POST_START_HOUR").unwrap_or(9),
            post_end_hour: parse_var(&lookup, "POST_END_HOUR").unwrap_or(21),

            poll_secs: parse_var(&lookup, "SCHEDULER_POLL_SECS").unwrap_or(60),

            backfill_batch_size: parse_var(&lookup, "BACKFILL_BATCH_SIZE").unwrap_or(5),
        }
    }

    pub fn schedule(&self) -> Result<ScheduleConfig, ConfigError> {
        ScheduleConfig::new(
            self.post_interval_hours,
            self.post_start_hour,
            self.post_end_hour,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }
}

/// Unset or unparseable values read as `None`
fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}
