//! Snapshot source - daily aggregate JSON over HTTP
//!
//! The scraper publishes one aggregate document per day plus a rolling
//! `latest.json`:
//!
//! ```text
//! {SNAPSHOT_SOURCE_URL}/2026-02-16.json
//! {SNAPSHOT_SOURCE_URL}/latest.json
//! ```
//!
//! Documents are validated by deserializing into `Snapshot`; anything that
//! doesn't parse is rejected here and never reaches the store.

use crate::analysis::Snapshot;
use crate::store::TimeSeriesStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse snapshot from {url}: {source}")]
    Parse {
        url: String,
        source: serde_json::Error,
    },
}

/// Outcome of a backfill run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackfillReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Inclusive list of dates from `start` to `end`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

#[derive(Clone)]
pub struct SnapshotFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl SnapshotFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}.json", self.base_url, name)
    }

    async fn fetch(&self, url: String) -> Result<Snapshot, FetchError> {
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Parse { url, source })
    }

    pub async fn fetch_by_date(&self, date: NaiveDate) -> Result<Snapshot, FetchError> {
        self.fetch(self.url_for(&date.to_string())).await
    }

    pub async fn fetch_latest(&self) -> Result<Snapshot, FetchError> {
        self.fetch(self.url_for("latest")).await
    }

    /// Fetch every date in `dates` and store the ones that succeed
    ///
    /// Requests run concurrently in batches of `batch_size`. A failed fetch or
    /// store write is counted and logged; it never aborts the run.
    pub async fn backfill(
        &self,
        store: Arc<dyn TimeSeriesStore>,
        dates: &[NaiveDate],
        batch_size: usize,
    ) -> BackfillReport {
        let mut report = BackfillReport {
            total: dates.len(),
            ..Default::default()
        };

        log::info!("🔄 Starting snapshot backfill ({} dates)", dates.len());

        for batch in dates.chunks(batch_size.max(1)) {
            let mut tasks = JoinSet::new();
            for &date in batch {
                let fetcher = self.clone();
                tasks.spawn(async move { (date, fetcher.fetch_by_date(date).await) });
            }

            while let Some(joined) = tasks.join_next().await {
                let (date, result) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("⚠️  Backfill task failed: {}", e);
                        report.failed += 1;
                        continue;
                    }
                };

                match result.map(|snapshot| store.put_snapshot(&snapshot)) {
                    Ok(Ok(())) => {
                        report.successful += 1;
                        if report.successful % 10 == 0 {
                            log::info!("   ├─ Processed {}/{} dates", report.successful, report.total);
                        }
                    }
                    Ok(Err(e)) => {
                        log::error!("❌ Failed to store snapshot for {}: {}", date, e);
                        report.failed += 1;
                    }
                    Err(e) => {
                        log::warn!("⚠️  No snapshot for {}: {}", date, e);
                        report.failed += 1;
                    }
                }
            }
        }

        log::info!("✅ Backfill complete");
        log::info!("   ├─ Total: {}", report.total);
        log::info!("   ├─ Successful: {}", report.successful);
        log::info!("   └─ Failed: {}", report.failed);

        report
    }
}
