//! Ranking engine - turns stored snapshots into a `DayAnalysis`
//!
//! ```text
//! TimeSeriesStore (today, today-1, today-7)
//!     ↓
//! RankingEngine::analyze()
//!     ↓
//! top-N lists + regional aggregates + deltas (ranking.rs)
//!     ↓
//! powder alerts + milestones (detector.rs)
//!     ↓
//! DayAnalysis → format_for_prompt()
//! ```
//!
//! The engine holds no mutable state. Snapshots are fetched once per call and
//! handed to `analyze_snapshots`, which is a pure function and can be called
//! concurrently for different dates.

use super::detector::EventDetector;
use super::ranking::{build_regional_aggregates, find_changes, top_n, DEFAULT_TOP_N};
use super::types::{DayAnalysis, Metric, Snapshot};
use crate::store::{StoreError, TimeSeriesStore};
use chrono::{Days, NaiveDate};
use std::sync::Arc;

/// Minimum trail delta reported as an opening
pub const MIN_TRAIL_OPENING: f64 = 5.0;

/// Minimum lift delta reported as an opening
pub const MIN_LIFT_OPENING: f64 = 2.0;

/// Days back for the week-over-week comparison
pub const WEEK_LOOKBACK_DAYS: u64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No data found for {date}")]
    DataUnavailable { date: NaiveDate },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct RankingEngine {
    store: Arc<dyn TimeSeriesStore>,
    detector: EventDetector,
    top_n: usize,
}

impl RankingEngine {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            store,
            detector: EventDetector::with_defaults(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_detector(mut self, detector: EventDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Analyze `date` against the day before and the week before
    ///
    /// # Returns
    /// * `Ok(DayAnalysis)` - comparison horizons without data are simply empty
    /// * `Err(AnalysisError::DataUnavailable)` - no snapshot stored for `date`
    pub fn analyze(&self, date: NaiveDate) -> Result<DayAnalysis, AnalysisError> {
        let today = self
            .store
            .get_snapshot(date)?
            .ok_or(AnalysisError::DataUnavailable { date })?;

        let yesterday = match date.checked_sub_days(Days::new(1)) {
            Some(d) => self.store.get_snapshot(d)?,
            None => None,
        };
        let week_ago = match date.checked_sub_days(Days::new(WEEK_LOOKBACK_DAYS)) {
            Some(d) => self.store.get_snapshot(d)?,
            None => None,
        };

        log::debug!(
            "📊 Analyzing {} (yesterday: {}, week ago: {})",
            date,
            if yesterday.is_some() { "yes" } else { "missing" },
            if week_ago.is_some() { "yes" } else { "missing" },
        );

        Ok(self.analyze_snapshots(&today, yesterday.as_ref(), week_ago.as_ref()))
    }

    /// Pure analysis over already-fetched snapshots
    pub fn analyze_snapshots(
        &self,
        today: &Snapshot,
        yesterday: Option<&Snapshot>,
        week_ago: Option<&Snapshot>,
    ) -> DayAnalysis {
        let empty = Snapshot::new(today.date);
        let yesterday = yesterday.unwrap_or(&empty);
        let week_ago = week_ago.unwrap_or(&empty);
        let n = self.top_n;

        let biggest_trail_openings = find_changes(today, yesterday, Metric::TrailsOpenCount)
            .into_iter()
            .filter(|c| c.delta >= MIN_TRAIL_OPENING)
            .collect();
        let biggest_lift_openings = find_changes(today, yesterday, Metric::LiftsOpenCount)
            .into_iter()
            .filter(|c| c.delta >= MIN_LIFT_OPENING)
            .collect();

        DayAnalysis {
            date: today.date,
            generated: today.generated.clone(),
            top_snow_overnight: top_n(today, Metric::SnowOvernight, n),
            top_snow_24h: top_n(today, Metric::Snow24h, n),
            top_snow_7day: top_n(today, Metric::Snow7day, n),
            top_season_total: top_n(today, Metric::SnowSeason, n),
            top_base_depth: top_n(today, Metric::BaseDepth, n),
            top_trails_open: top_n(today, Metric::TrailsOpenCount, n),
            top_trails_pct: top_n(today, Metric::TrailsOpenPct, n),
            top_lifts_open: top_n(today, Metric::LiftsOpenCount, n),
            regions: build_regional_aggregates(today),
            biggest_overnight_gains: find_changes(today, yesterday, Metric::SnowOvernight),
            biggest_snow_gains: find_changes(today, yesterday, Metric::Snow24h),
            biggest_trail_openings,
            biggest_lift_openings,
            week_over_week_trends: find_changes(today, week_ago, Metric::SnowSeason),
            powder_alerts: self.detector.powder_alerts(today),
            milestones: self.detector.milestones(today, yesterday),
        }
    }
}
