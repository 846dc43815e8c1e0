//! Show when each approved item is expected to be published
//!
//! Usage:
//!   schedule_preview [--json]

use chrono::Local;
use dotenv::dotenv;
use skiflow::config::ServiceConfig;
use skiflow::scheduler::project_schedule;
use skiflow::store::{ContentQueue, ItemStatus, SqliteStore};
use std::env;

const PREVIEW_CHARS: usize = 70;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let as_json = env::args().any(|a| a == "--json");

    let config = ServiceConfig::from_env();
    let schedule = config.schedule()?;
    let store = SqliteStore::open(&config.db_path, &config.schema_dir)?;

    let approved = store.get_by_status(ItemStatus::Approved).await?;
    let preview = project_schedule(&schedule, approved, Local::now().naive_local());

    if as_json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!(
        "Posting every {}h between {:02}:00 and {:02}:00",
        schedule.interval_hours(),
        schedule.start_hour(),
        schedule.end_hour()
    );

    if preview.is_empty() {
        println!("No approved items in queue");
        return Ok(());
    }

    for scheduled in &preview {
        let text: String = scheduled
            .item
            .content
            .chars()
            .take(PREVIEW_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        println!(
            "{}  [{}] {}  {}",
            scheduled.estimated_time.format("%Y-%m-%d %H:%M"),
            scheduled.item.post_type,
            scheduled.item.id,
            text
        );
    }

    Ok(())
}
