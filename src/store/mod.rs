//! Storage collaborators: daily snapshots and the content queue
//!
//! Both traits are implemented by `SqliteStore` (see `db.rs`). The analysis
//! core only reads snapshots; the scheduler only reads approved items and
//! writes status/metadata transitions.
//!
//! ## Tables (see `/sql/`)
//!
//! - `snapshots` → `Snapshot` (one row per date, JSON payload)
//! - `content_items` → `QueueItem`

pub mod db;

pub use db::{run_schema_migrations, SqliteStore};

use crate::analysis::Snapshot;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid date or timestamp: {0}")]
    InvalidDate(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Schema error: {0}")]
    Schema(String),
}

/// Lifecycle of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
    Posted,
    Archived,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Pending,
        ItemStatus::Approved,
        ItemStatus::Rejected,
        ItemStatus::Posted,
        ItemStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Posted => "posted",
            ItemStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::InvalidStatus(s.to_string()))
    }
}

/// A piece of approved-or-not content waiting to be published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub generation_date: NaiveDate,
    pub status: ItemStatus,
    pub post_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl QueueItem {
    /// New pending item with a random id, created now
    pub fn new(
        post_type: impl Into<String>,
        content: impl Into<String>,
        generation_date: NaiveDate,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            generation_date,
            status: ItemStatus::Pending,
            post_type: post_type.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Set `id` to `status` and return the updated item
pub async fn transition(
    queue: &dyn ContentQueue,
    id: &str,
    status: ItemStatus,
) -> Result<QueueItem, StoreError> {
    queue.update_status(id, status).await?;
    queue
        .get_by_id(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Items awaiting action: pending then approved, each newest first
pub async fn open_items(queue: &dyn ContentQueue) -> Result<Vec<QueueItem>, StoreError> {
    let mut items = queue.get_by_status(ItemStatus::Pending).await?;
    items.extend(queue.get_by_status(ItemStatus::Approved).await?);
    Ok(items)
}

/// Snapshot days held by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Coverage {
    pub total_days: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Item count per status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub counts: BTreeMap<ItemStatus, usize>,
}

impl StatusCounts {
    pub fn get(&self, status: ItemStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Date-keyed daily snapshot storage
pub trait TimeSeriesStore: Send + Sync {
    fn get_snapshot(&self, date: NaiveDate) -> Result<Option<Snapshot>, StoreError>;

    /// Snapshots with `start <= date <= end`, oldest first
    fn get_snapshot_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Snapshot)>, StoreError>;

    /// Insert, replacing any snapshot already stored for the same date
    fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    fn coverage(&self) -> Result<Coverage, StoreError>;
}

/// Persisted content items with a status lifecycle
#[async_trait]
pub trait ContentQueue: Send + Sync {
    async fn insert(&self, item: &QueueItem) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<QueueItem>, StoreError>;

    /// Items in `status`, newest first (callers wanting FIFO take from the back)
    async fn get_by_status(&self, status: ItemStatus) -> Result<Vec<QueueItem>, StoreError>;

    async fn update_status(&self, id: &str, status: ItemStatus) -> Result<(), StoreError>;

    /// Merge `patch` into the item's metadata; keys not in `patch` are kept
    async fn update_metadata(
        &self,
        id: &str,
        patch: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError>;

    async fn status_counts(&self) -> Result<StatusCounts, StoreError>;
}
