//! Inspect and manage the content queue
//!
//! Usage:
//!   queue list [--status STATUS]
//!   queue show ID
//!   queue set-status ID STATUS
//!   queue add --type TYPE --file PATH [--date YYYY-MM-DD]
//!   queue stats
//!
//! `list` without `--status` shows pending then approved items. STATUS is
//! one of pending, approved, rejected, posted, archived.

use chrono::{Local, NaiveDate};
use dotenv::dotenv;
use log::info;
use skiflow::config::ServiceConfig;
use skiflow::store::{self, ContentQueue, ItemStatus, QueueItem, SqliteStore};
use std::env;
use std::fs;

const PREVIEW_CHARS: usize = 70;

fn usage() -> Box<dyn std::error::Error> {
    "Usage: queue <list [--status S] | show ID | set-status ID STATUS | add --type T --file F [--date D] | stats>"
        .into()
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == name).map(|w| w[1].as_str())
}

fn print_row(item: &QueueItem) {
    let text: String = item
        .content
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    println!(
        "{}  {:<8}  [{}] {}  {}",
        item.created_at.format("%Y-%m-%d %H:%M"),
        item.status.as_str(),
        item.post_type,
        item.id,
        text
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().ok_or_else(usage)?;

    let config = ServiceConfig::from_env();
    let queue = SqliteStore::open(&config.db_path, &config.schema_dir)?;

    match command.as_str() {
        "list" => {
            let items = match flag(&args, "--status") {
                Some(s) => queue.get_by_status(s.parse::<ItemStatus>()?).await?,
                None => store::open_items(&queue).await?,
            };
            if items.is_empty() {
                println!("No items");
            }
            for item in &items {
                print_row(item);
            }
        }
        "show" => {
            let id = args.get(1).ok_or_else(usage)?;
            let item = queue
                .get_by_id(id)
                .await?
                .ok_or_else(|| format!("Item not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        "set-status" => {
            let (id, status) = match (args.get(1), args.get(2)) {
                (Some(id), Some(status)) => (id, status.parse::<ItemStatus>()?),
                _ => return Err(usage()),
            };
            let item = store::transition(&queue, id, status).await?;
            info!("✅ {} is now {}", item.id, item.status);
            println!("{} {}", item.id, item.status);
        }
        "add" => {
            let post_type = flag(&args, "--type").ok_or_else(usage)?;
            let path = flag(&args, "--file").ok_or_else(usage)?;
            let generation_date = match flag(&args, "--date") {
                Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|_| format!("Invalid --date: {}", d))?,
                None => Local::now().date_naive(),
            };

            let content = fs::read_to_string(path)?;
            let content = content.trim();
            if content.is_empty() {
                return Err(format!("{} is empty", path).into());
            }

            let item = QueueItem::new(post_type, content, generation_date);
            queue.insert(&item).await?;
            info!("📝 Queued {} ({})", item.id, item.post_type);
            println!("{}", item.id);
        }
        "stats" => {
            let counts = queue.status_counts().await?;
            for status in ItemStatus::ALL {
                println!("{:<9} {}", status.as_str(), counts.get(status));
            }
            println!("{:<9} {}", "total", counts.total());
        }
        _ => return Err(usage()),
    }

    Ok(())
}
