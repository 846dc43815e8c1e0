//! Ranking primitives: top-N slices, regional rollups, snapshot deltas

use super::types::{Change, Metric, RankingItem, RegionalAggregate, Snapshot};
use std::collections::HashMap;

/// Maximum number of changes kept per comparison
pub const MAX_CHANGES: usize = 15;

/// Default length of a top list
pub const DEFAULT_TOP_N: usize = 10;

/// Insertion-ordered entity → value map
///
/// Items with a null value are skipped. A repeated entity keeps its first
/// position and takes the latest value.
pub(crate) struct EntityValues<'a> {
    order: Vec<(&'a RankingItem, f64)>,
    index: HashMap<&'a str, usize>,
}

impl<'a> EntityValues<'a> {
    pub(crate) fn from_items(items: &'a [RankingItem]) -> Self {
        let mut order: Vec<(&RankingItem, f64)> = Vec::with_capacity(items.len());
        let mut index = HashMap::with_capacity(items.len());

        for item in items {
            let Some(value) = item.value else { continue };
            match index.get(item.entity_id.as_str()) {
                Some(&pos) => order[pos] = (item, value),
                None => {
                    index.insert(item.entity_id.as_str(), order.len());
                    order.push((item, value));
                }
            }
        }

        Self { order, index }
    }

    pub(crate) fn get(&self, entity_id: &str) -> Option<f64> {
        self.index.get(entity_id).map(|&pos| self.order[pos].1)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&'a RankingItem, f64)> + '_ {
        self.order.iter().copied()
    }
}

/// Leading `n` items with a strictly positive value, in snapshot order
pub fn top_n(snapshot: &Snapshot, metric: Metric, n: usize) -> Vec<RankingItem> {
    snapshot
        .items(metric)
        .iter()
        .filter(|item| item.value.is_some_and(|v| v > 0.0))
        .take(n)
        .cloned()
        .collect()
}

/// Per-region sums over the trails-open-pct reference list, finalized to averages
///
/// Resorts without a region are left out. Lookups into the other metric lists
/// fall back to zero when the resort is missing there.
pub fn build_regional_aggregates(snapshot: &Snapshot) -> Vec<RegionalAggregate> {
    let overnight = EntityValues::from_items(snapshot.items(Metric::SnowOvernight));
    let snow_24h = EntityValues::from_items(snapshot.items(Metric::Snow24h));
    let base_depth = EntityValues::from_items(snapshot.items(Metric::BaseDepth));
    let trails_count = EntityValues::from_items(snapshot.items(Metric::TrailsOpenCount));

    let mut regions: Vec<RegionalAggregate> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();

    for resort in snapshot.items(Metric::TrailsOpenPct) {
        let Some(region) = resort.region_id.as_deref() else {
            continue;
        };

        let pos = *by_name.entry(region).or_insert_with(|| {
            regions.push(RegionalAggregate::empty(region));
            regions.len() - 1
        });
        let agg = &mut regions[pos];
        let id = resort.entity_id.as_str();

        agg.resort_count += 1;
        agg.avg_snow_overnight += overnight.get(id).unwrap_or(0.0);
        agg.avg_snow_24h += snow_24h.get(id).unwrap_or(0.0);
        agg.avg_trails_pct += resort.value.unwrap_or(0.0);
        agg.avg_base_depth += base_depth.get(id).unwrap_or(0.0);
        agg.total_trails_open += trails_count.get(id).unwrap_or(0.0);
    }

    for agg in &mut regions {
        let count = agg.resort_count as f64;
        agg.avg_snow_overnight /= count;
        agg.avg_snow_24h /= count;
        agg.avg_trails_pct /= count;
        agg.avg_base_depth /= count;
    }

    regions
}

/// Biggest absolute movers for `metric` between `today` and `other`
///
/// Only resorts valued on both sides are compared; unchanged ones are dropped.
/// The sort is stable, so equal deltas keep today's ranking order.
pub fn find_changes(today: &Snapshot, other: &Snapshot, metric: Metric) -> Vec<Change> {
    let today_values = EntityValues::from_items(today.items(metric));
    let other_values = EntityValues::from_items(other.items(metric));

    let mut changes: Vec<Change> = today_values
        .iter()
        .filter_map(|(item, after)| {
            let before = other_values.get(&item.entity_id)?;
            let delta = after - before;
            if delta == 0.0 {
                return None;
            }
            Some(Change {
                entity_id: item.entity_id.clone(),
                display_name: item.display_name.clone(),
                region_id: item.region_id.clone(),
                metric,
                value_before: before,
                value_after: after,
                delta,
                percent_delta: (before > 0.0).then(|| delta / before * 100.0),
            })
        })
        .collect();

    changes.sort_by(|a, b| b.delta.abs().total_cmp(&a.delta.abs()));
    changes.truncate(MAX_CHANGES);
    changes
}
