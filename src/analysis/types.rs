//! Snapshot and analysis data structures
//!
//! `Snapshot` mirrors the daily aggregate JSON published by the scraper:
//!
//! ```json
//! {
//!   "date": "2026-02-16",
//!   "generated": "2026-02-16T06:02:11Z",
//!   "rankings": {
//!     "snow_overnight": [{ "resort": "vail", "name": "Vail", "region": "Colorado", "value": 8 }]
//!   }
//! }
//! ```
//!
//! Everything else in this module is derived by the engine and lives only
//! for the duration of one analysis call.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ranked metrics published in every snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SnowOvernight,
    Snow24h,
    Snow7day,
    SnowSeason,
    BaseDepth,
    TrailsOpenCount,
    /// Fraction in `0.0..=1.0`
    TrailsOpenPct,
    LiftsOpenCount,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::SnowOvernight,
        Metric::Snow24h,
        Metric::Snow7day,
        Metric::SnowSeason,
        Metric::BaseDepth,
        Metric::TrailsOpenCount,
        Metric::TrailsOpenPct,
        Metric::LiftsOpenCount,
    ];

    /// Key used in the snapshot `rankings` object
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::SnowOvernight => "snow_overnight",
            Metric::Snow24h => "snow_24h",
            Metric::Snow7day => "snow_7day",
            Metric::SnowSeason => "snow_season",
            Metric::BaseDepth => "base_depth",
            Metric::TrailsOpenCount => "trails_open_count",
            Metric::TrailsOpenPct => "trails_open_pct",
            Metric::LiftsOpenCount => "lifts_open_count",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.as_str() == key)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a ranked metric list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingItem {
    #[serde(rename = "resort")]
    pub entity_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "region")]
    pub region_id: Option<String>,
    pub value: Option<f64>,
}

/// One day of per-resort, per-metric measurements
///
/// Lists arrive pre-ranked from the data source; nothing here re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    #[serde(default)]
    pub generated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superlatives: Option<serde_json::Value>,
    #[serde(default)]
    pub rankings: BTreeMap<String, Vec<RankingItem>>,
}

impl Snapshot {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            generated: None,
            superlatives: None,
            rankings: BTreeMap::new(),
        }
    }

    /// Ranked list for `metric`, empty if the snapshot doesn't carry it
    pub fn items(&self, metric: Metric) -> &[RankingItem] {
        self.rankings
            .get(metric.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn with_items(mut self, metric: Metric, items: Vec<RankingItem>) -> Self {
        self.rankings.insert(metric.as_str().to_string(), items);
        self
    }
}

/// Per-region rollup built from the trails-open-pct reference list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalAggregate {
    pub region: String,
    pub resort_count: usize,
    pub avg_snow_overnight: f64,
    pub avg_snow_24h: f64,
    pub avg_trails_pct: f64,
    pub avg_base_depth: f64,
    /// Sum, not an average
    pub total_trails_open: f64,
}

impl RegionalAggregate {
    pub(crate) fn empty(region: &str) -> Self {
        Self {
            region: region.to_string(),
            resort_count: 0,
            avg_snow_overnight: 0.0,
            avg_snow_24h: 0.0,
            avg_trails_pct: 0.0,
            avg_base_depth: 0.0,
            total_trails_open: 0.0,
        }
    }
}

/// Delta of one metric for one resort between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub entity_id: String,
    pub display_name: String,
    pub region_id: Option<String>,
    pub metric: Metric,
    pub value_before: f64,
    pub value_after: f64,
    pub delta: f64,
    /// None when `value_before` is zero
    pub percent_delta: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertTimeframe {
    #[serde(rename = "overnight")]
    Overnight,
    #[serde(rename = "24h")]
    Day,
}

impl AlertTimeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTimeframe::Overnight => "overnight",
            AlertTimeframe::Day => "24h",
        }
    }
}

impl fmt::Display for AlertTimeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowderAlert {
    pub entity_id: String,
    pub display_name: String,
    pub region_id: Option<String>,
    pub inches: f64,
    pub timeframe: AlertTimeframe,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MilestoneKind {
    SeasonTotal { threshold: f64, value: f64 },
    FullyOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub entity_id: String,
    pub display_name: String,
    pub kind: MilestoneKind,
}

impl Milestone {
    pub fn description(&self) -> String {
        match &self.kind {
            MilestoneKind::SeasonTotal { threshold, value } => {
                format!("Crossed {}\" season total (now at {}\")", threshold, value)
            }
            MilestoneKind::FullyOpen => "Reached 100% trails open".to_string(),
        }
    }
}

/// Everything derived for one target date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAnalysis {
    pub date: NaiveDate,
    pub generated: Option<String>,

    pub top_snow_overnight: Vec<RankingItem>,
    pub top_snow_24h: Vec<RankingItem>,
    pub top_snow_7day: Vec<RankingItem>,
    pub top_season_total: Vec<RankingItem>,
    pub top_base_depth: Vec<RankingItem>,
    pub top_trails_open: Vec<RankingItem>,
    pub top_trails_pct: Vec<RankingItem>,
    pub top_lifts_open: Vec<RankingItem>,

    /// First-seen region order
    pub regions: Vec<RegionalAggregate>,

    // vs yesterday
    pub biggest_overnight_gains: Vec<Change>,
    pub biggest_snow_gains: Vec<Change>,
    pub biggest_trail_openings: Vec<Change>,
    pub biggest_lift_openings: Vec<Change>,

    // vs a week ago
    pub week_over_week_trends: Vec<Change>,

    pub powder_alerts: Vec<PowderAlert>,
    pub milestones: Vec<Milestone>,
}
