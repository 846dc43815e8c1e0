//! SQLite implementation of the snapshot store and content queue
//!
//! A single connection behind a mutex serves both traits. Every method is a
//! short synchronous statement, so the async queue methods never hold the
//! lock across an await.

use super::{
    ContentQueue, Coverage, ItemStatus, QueueItem, StatusCounts, StoreError, TimeSeriesStore,
};
use crate::analysis::Snapshot;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir` in name order and executes them.
/// All SQL files must use "IF NOT EXISTS" clauses for idempotency.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &Path) -> Result<(), StoreError> {
    if !schema_dir.exists() {
        return Err(StoreError::Schema(format!(
            "Schema directory not found: {}",
            schema_dir.display()
        )));
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::debug!("📊 Enabled WAL mode for SQLite database");

    let mut sql_files: Vec<_> = fs::read_dir(schema_dir)
        .map_err(|e| StoreError::Schema(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort();

    log::info!("🔧 Running schema migrations from: {}", schema_dir.display());

    for path in sql_files {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("   ├─ Executing: {}", filename);

        let sql_content = fs::read_to_string(&path).map_err(|e| StoreError::Schema(e.to_string()))?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ All schema migrations completed successfully");
    Ok(())
}

fn timestamp(t: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches time order
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Row as stored, before parsing text columns
struct RawItem {
    id: String,
    created_at: String,
    generation_date: String,
    status: String,
    post_type: String,
    content: String,
    metadata: String,
}

impl RawItem {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            generation_date: row.get(2)?,
            status: row.get(3)?,
            post_type: row.get(4)?,
            content: row.get(5)?,
            metadata: row.get(6)?,
        })
    }

    fn into_item(self) -> Result<QueueItem, StoreError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| StoreError::InvalidDate(self.created_at.clone()))?
            .with_timezone(&Utc);
        let generation_date = NaiveDate::parse_from_str(&self.generation_date, "%Y-%m-%d")
            .map_err(|_| StoreError::InvalidDate(self.generation_date.clone()))?;

        Ok(QueueItem {
            id: self.id,
            created_at,
            generation_date,
            status: self.status.parse()?,
            post_type: self.post_type,
            content: self.content,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

const ITEM_COLUMNS: &str =
    "id, created_at, generation_date, status, post_type, content, metadata";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database and apply the schema
    ///
    /// Arguments:
    /// - `db_path`: SQLite database file; parent directories are created
    /// - `schema_dir`: directory of `.sql` migration files
    pub fn open(db_path: impl AsRef<Path>, schema_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Schema(e.to_string()))?;
        }

        let mut conn = Connection::open(db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_schema_migrations(&mut conn, schema_dir.as_ref())?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl TimeSeriesStore for SqliteStore {
    fn get_snapshot(&self, date: NaiveDate) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM snapshots WHERE date = ?1",
                [date.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    fn get_snapshot_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Snapshot)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT data FROM snapshots
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map([start.to_string(), end.to_string()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut snapshots = Vec::new();
        for json in rows {
            let snapshot: Snapshot = serde_json::from_str(&json?)?;
            snapshots.push((snapshot.date, snapshot));
        }
        Ok(snapshots)
    }

    fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let data = serde_json::to_string(snapshot)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (date, data, fetched_at) VALUES (?1, ?2, ?3)",
            params![snapshot.date.to_string(), data, timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    fn coverage(&self) -> Result<Coverage, StoreError> {
        let conn = self.conn()?;
        let (total, first, last): (i64, Option<String>, Option<String>) = conn.query_row(
            "SELECT COUNT(*), MIN(date), MAX(date) FROM snapshots",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let parse = |s: Option<String>| -> Result<Option<NaiveDate>, StoreError> {
            s.map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|_| StoreError::InvalidDate(d)))
                .transpose()
        };

        Ok(Coverage {
            total_days: total as usize,
            first: parse(first)?,
            last: parse(last)?,
        })
    }
}

#[async_trait]
impl ContentQueue for SqliteStore {
    async fn insert(&self, item: &QueueItem) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&item.metadata)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO content_items (
                id, created_at, generation_date, status, post_type, content, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                item.id,
                timestamp(&item.created_at),
                item.generation_date.to_string(),
                item.status.as_str(),
                item.post_type,
                item.content,
                metadata,
            ],
        )?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<QueueItem>, StoreError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM content_items WHERE id = ?1", ITEM_COLUMNS),
                [id],
                RawItem::from_row,
            )
            .optional()?;
        raw.map(RawItem::into_item).transpose()
    }

    async fn get_by_status(&self, status: ItemStatus) -> Result<Vec<QueueItem>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM content_items
             WHERE status = ?1
             ORDER BY created_at DESC, rowid DESC",
            ITEM_COLUMNS
        ))?;

        let raws = stmt
            .query_map([status.as_str()], RawItem::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter().map(RawItem::into_item).collect()
    }

    async fn update_status(&self, id: &str, status: ItemStatus) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE content_items SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update_metadata(
        &self,
        id: &str,
        patch: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT metadata FROM content_items WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let existing = existing.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut metadata: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&existing)?;
        metadata.extend(patch);

        tx.execute(
            "UPDATE content_items SET metadata = ?1 WHERE id = ?2",
            params![serde_json::to_string(&metadata)?, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM content_items GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = StatusCounts::default();
        for status in ItemStatus::ALL {
            counts.counts.insert(status, 0);
        }
        for (status, count) in rows {
            counts.counts.insert(status.parse()?, count as usize);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Metric, RankingItem};
    use chrono::TimeZone;
    use serde_json::json;

    fn schema_dir() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/sql"))
    }

    fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("skiflow.db"), schema_dir()).unwrap();
        (dir, store)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn item(id: &str, minute: u32, status: ItemStatus) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 2, 16, 8, minute, 0).unwrap(),
            generation_date: date(16),
            status,
            post_type: "powder_alert".to_string(),
            content: format!("post {}", id),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_missing_schema_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteStore::open(dir.path().join("x.db"), dir.path().join("nope"));
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_snapshot_put_get_and_range() {
        let (_dir, store) = open_store();
        let ranked = vec![RankingItem {
            entity_id: "vail".to_string(),
            display_name: "Vail".to_string(),
            region_id: Some("Colorado".to_string()),
            value: Some(8.0),
        }];

        for d in [14, 16, 15] {
            store
                .put_snapshot(&Snapshot::new(date(d)).with_items(Metric::SnowOvernight, ranked.clone()))
                .unwrap();
        }

        let fetched = store.get_snapshot(date(16)).unwrap().unwrap();
        assert_eq!(fetched.items(Metric::SnowOvernight), ranked.as_slice());
        assert!(store.get_snapshot(date(1)).unwrap().is_none());

        let range = store.get_snapshot_range(date(15), date(16)).unwrap();
        let dates: Vec<NaiveDate> = range.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![date(15), date(16)]);

        let coverage = store.coverage().unwrap();
        assert_eq!(coverage.total_days, 3);
        assert_eq!(coverage.first, Some(date(14)));
        assert_eq!(coverage.last, Some(date(16)));
    }

    #[test]
    fn test_put_snapshot_replaces_same_date() {
        let (_dir, store) = open_store();
        store.put_snapshot(&Snapshot::new(date(16))).unwrap();
        let mut updated = Snapshot::new(date(16));
        updated.generated = Some("2026-02-16T07:00:00Z".to_string());
        store.put_snapshot(&updated).unwrap();

        assert_eq!(store.coverage().unwrap().total_days, 1);
        assert_eq!(store.get_snapshot(date(16)).unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_get_by_status_newest_first() {
        let (_dir, store) = open_store();
        store.insert(&item("old", 1, ItemStatus::Approved)).await.unwrap();
        store.insert(&item("new", 3, ItemStatus::Approved)).await.unwrap();
        store.insert(&item("mid", 2, ItemStatus::Approved)).await.unwrap();
        store.insert(&item("draft", 4, ItemStatus::Pending)).await.unwrap();

        let approved = store.get_by_status(ItemStatus::Approved).await.unwrap();
        let ids: Vec<&str> = approved.iter().map(|i| i.id.as_str()).collect();

        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_update_status_and_counts() {
        let (_dir, store) = open_store();
        store.insert(&item("a", 1, ItemStatus::Approved)).await.unwrap();
        store.insert(&item("b", 2, ItemStatus::Pending)).await.unwrap();

        store.update_status("a", ItemStatus::Posted).await.unwrap();
        let missing = store.update_status("zzz", ItemStatus::Posted).await;

        assert!(matches!(missing, Err(StoreError::NotFound(_))));
        let counts = store.status_counts().await.unwrap();
        assert_eq!(counts.get(ItemStatus::Posted), 1);
        assert_eq!(counts.get(ItemStatus::Pending), 1);
        assert_eq!(counts.get(ItemStatus::Approved), 0);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_update_metadata_merges() {
        let (_dir, store) = open_store();
        let mut original = item("a", 1, ItemStatus::Approved);
        original.metadata.insert("reasoning".to_string(), json!("big storm"));
        store.insert(&original).await.unwrap();

        let mut patch = serde_json::Map::new();
        patch.insert("external_id".to_string(), json!("123"));
        store.update_metadata("a", patch).await.unwrap();

        let stored = store.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.metadata.get("reasoning"), Some(&json!("big storm")));
        assert_eq!(stored.metadata.get("external_id"), Some(&json!("123")));
        assert_eq!(stored.created_at, original.created_at);
    }
}
