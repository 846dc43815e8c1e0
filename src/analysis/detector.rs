//! Event detection with configurable thresholds

use super::ranking::EntityValues;
use super::types::{AlertTimeframe, Metric, Milestone, MilestoneKind, PowderAlert, Snapshot};
use std::collections::HashSet;

pub const DEFAULT_SEASON_THRESHOLDS: [f64; 5] = [100.0, 150.0, 200.0, 250.0, 300.0];

pub struct EventDetector {
    overnight_threshold: f64,
    day_threshold: f64,
    season_thresholds: Vec<f64>,
}

impl EventDetector {
    pub fn new(overnight_threshold: f64, day_threshold: f64, season_thresholds: Vec<f64>) -> Self {
        Self {
            overnight_threshold,
            day_threshold,
            season_thresholds,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(6.0, 10.0, DEFAULT_SEASON_THRESHOLDS.to_vec())
    }

    /// Detect powder days in a single snapshot
    ///
    /// # Rules
    /// - **overnight**: overnight snow >= overnight threshold
    /// - **24h**: 24h snow >= day threshold, unless already alerted overnight
    ///
    /// Overnight alerts are emitted first, then any new 24h alerts.
    pub fn powder_alerts(&self, today: &Snapshot) -> Vec<PowderAlert> {
        let mut alerts = Vec::new();
        let mut alerted: HashSet<&str> = HashSet::new();

        let passes = [
            (Metric::SnowOvernight, self.overnight_threshold, AlertTimeframe::Overnight),
            (Metric::Snow24h, self.day_threshold, AlertTimeframe::Day),
        ];

        for (metric, threshold, timeframe) in passes {
            for item in today.items(metric) {
                let Some(inches) = item.value.filter(|v| *v >= threshold) else {
                    continue;
                };
                if timeframe == AlertTimeframe::Day && alerted.contains(item.entity_id.as_str()) {
                    continue;
                }
                alerted.insert(item.entity_id.as_str());
                alerts.push(PowderAlert {
                    entity_id: item.entity_id.clone(),
                    display_name: item.display_name.clone(),
                    region_id: item.region_id.clone(),
                    inches,
                    timeframe,
                });
            }
        }

        alerts
    }

    /// Detect threshold crossings between two consecutive snapshots
    ///
    /// # Milestones
    /// - **Season total**: one record per threshold `t` with `yesterday < t <= today`
    /// - **Fully open**: trails-open pct is exactly 1 today and was recorded below 1 yesterday
    ///
    /// Resorts without a prior-day value never produce a milestone.
    pub fn milestones(&self, today: &Snapshot, yesterday: &Snapshot) -> Vec<Milestone> {
        let mut milestones = Vec::new();

        let today_season = EntityValues::from_items(today.items(Metric::SnowSeason));
        let yesterday_season = EntityValues::from_items(yesterday.items(Metric::SnowSeason));

        for (item, value) in today_season.iter() {
            let Some(previous) = yesterday_season.get(&item.entity_id) else {
                continue;
            };
            for &threshold in &self.season_thresholds {
                if previous < threshold && value >= threshold {
                    milestones.push(Milestone {
                        entity_id: item.entity_id.clone(),
                        display_name: item.display_name.clone(),
                        kind: MilestoneKind::SeasonTotal { threshold, value },
                    });
                }
            }
        }

        let yesterday_pct = yesterday.items(Metric::TrailsOpenPct);
        for item in today.items(Metric::TrailsOpenPct) {
            if item.value != Some(1.0) {
                continue;
            }
            let previous = yesterday_pct
                .iter()
                .find(|y| y.entity_id == item.entity_id)
                .and_then(|y| y.value);
            if previous.is_some_and(|v| v < 1.0) {
                milestones.push(Milestone {
                    entity_id: item.entity_id.clone(),
                    display_name: item.display_name.clone(),
                    kind: MilestoneKind::FullyOpen,
                });
            }
        }

        milestones
    }
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}
