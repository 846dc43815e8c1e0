//! skiflow service - publishes approved content on a daily cadence
//!
//! Usage:
//!   cargo run --release --bin skiflow_service
//!
//! Environment variables:
//!   SKIFLOW_DB_PATH - SQLite database path (default: ./data/skiflow.db)
//!   PUBLISH_WEBHOOK_URL - Publish endpoint (unset: scheduler disabled)
//!   POST_INTERVAL_HOURS / POST_START_HOUR / POST_END_HOUR - Cadence (default: 1.5 / 9 / 21)
//!   SCHEDULER_POLL_SECS - Tick interval (default: 60)

use dotenv::dotenv;
use log::{error, info, warn};
use skiflow::config::ServiceConfig;
use skiflow::publisher::WebhookPublisher;
use skiflow::scheduler::CadenceScheduler;
use skiflow::store::{ContentQueue, ItemStatus, SqliteStore, TimeSeriesStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 skiflow service");

    let config = ServiceConfig::from_env();
    let schedule = config.schedule()?;

    info!("🔧 Opening database...");
    let store = Arc::new(SqliteStore::open(&config.db_path, &config.schema_dir)?);

    let coverage = store.coverage()?;
    let counts = store.status_counts().await?;
    info!("📊 Store status:");
    info!("   ├─ Database: {}", config.db_path);
    match (coverage.first, coverage.last) {
        (Some(first), Some(last)) => info!(
            "   ├─ Snapshots: {} days ({} to {})",
            coverage.total_days, first, last
        ),
        _ => info!("   ├─ Snapshots: none"),
    }
    for status in ItemStatus::ALL {
        info!("   ├─ {}: {}", status, counts.get(status));
    }
    info!("   └─ Total items: {}", counts.total());

    let Some(webhook_url) = config.webhook_url.clone() else {
        warn!("⚠️  Scheduler is DISABLED (set PUBLISH_WEBHOOK_URL to activate)");
        info!("   └─ Exiting gracefully...");
        return Ok(());
    };

    let publisher = Arc::new(WebhookPublisher::new(webhook_url)?);
    let scheduler = Arc::new(
        CadenceScheduler::new(store.clone(), publisher, schedule)
            .with_poll_interval(config.poll_interval()),
    );

    let now = scheduler.now();
    info!("📅 Next posting slot: {}", scheduler.next_slot(now));

    let handle = scheduler.start();

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    handle.stop().await;

    info!("✅ skiflow service stopped");
    Ok(())
}
