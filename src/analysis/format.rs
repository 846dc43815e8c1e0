//! Plain-text rendering of a `DayAnalysis`
//!
//! The output is the only artifact handed to the downstream text generation
//! step. Section order is fixed; a section with nothing to show is left out.

use super::types::{Change, DayAnalysis, RankingItem};

/// Rows shown per ranked section
pub const DISPLAY_ROWS: usize = 8;

/// Rows shown in the week-over-week section
pub const WEEK_DISPLAY_ROWS: usize = 5;

fn region(region: &Option<String>) -> &str {
    region.as_deref().unwrap_or("n/a")
}

fn value(item: &RankingItem) -> f64 {
    item.value.unwrap_or(0.0)
}

struct Sections {
    lines: Vec<String>,
}

impl Sections {
    fn section<T>(&mut self, title: &str, rows: &[T], render: impl Fn(&T) -> String) {
        if rows.is_empty() {
            return;
        }
        self.lines.push(title.to_string());
        for row in rows {
            self.lines.push(format!("  {}", render(row)));
        }
        self.lines.push(String::new());
    }
}

/// Whole percent from a 0..1 fraction, halves rounded up
fn percent(fraction: f64) -> f64 {
    (fraction * 100.0).round()
}

fn head<T>(rows: &[T], n: usize) -> &[T] {
    &rows[..rows.len().min(n)]
}

fn snow_row(item: &RankingItem) -> String {
    format!("{} ({}): {}\"", item.display_name, region(&item.region_id), value(item))
}

/// Render the analysis as deterministic prompt text
pub fn format_for_prompt(analysis: &DayAnalysis) -> String {
    let mut out = Sections {
        lines: vec![
            format!("=== SKI RESORT DATA FOR {} ===", analysis.date),
            String::new(),
        ],
    };

    out.section(
        "OVERNIGHT SNOWFALL (top resorts):",
        head(&analysis.top_snow_overnight, DISPLAY_ROWS),
        snow_row,
    );
    out.section(
        "24-HOUR SNOWFALL (top resorts):",
        head(&analysis.top_snow_24h, DISPLAY_ROWS),
        snow_row,
    );
    out.section(
        "7-DAY SNOWFALL (top 8):",
        head(&analysis.top_snow_7day, DISPLAY_ROWS),
        snow_row,
    );
    out.section(
        "SEASON TOTALS (top 8):",
        head(&analysis.top_season_total, DISPLAY_ROWS),
        snow_row,
    );
    out.section(
        "DEEPEST BASE DEPTH (top 8):",
        head(&analysis.top_base_depth, DISPLAY_ROWS),
        snow_row,
    );
    out.section(
        "MOST TRAILS OPEN (top 8):",
        head(&analysis.top_trails_open, DISPLAY_ROWS),
        |r| format!("{} ({}): {} trails", r.display_name, region(&r.region_id), value(r)),
    );
    out.section(
        "HIGHEST % TRAILS OPEN (top 8):",
        head(&analysis.top_trails_pct, DISPLAY_ROWS),
        |r| format!("{} ({}): {}%", r.display_name, region(&r.region_id), percent(value(r))),
    );

    // Wettest regions first; ties keep first-seen order
    let mut regions: Vec<_> = analysis.regions.iter().collect();
    regions.sort_by(|a, b| b.avg_snow_24h.total_cmp(&a.avg_snow_24h));
    out.section("REGIONAL AVERAGES:", &regions, |agg| {
        format!(
            "{} ({} resorts): avg overnight {:.1}\", avg 24h {:.1}\", avg base {:.1}\", avg trails open {}%, total trails open: {}",
            agg.region,
            agg.resort_count,
            agg.avg_snow_overnight,
            agg.avg_snow_24h,
            agg.avg_base_depth,
            percent(agg.avg_trails_pct),
            agg.total_trails_open,
        )
    });

    out.section(
        "BIGGEST 24H SNOW CHANGES VS YESTERDAY:",
        head(&analysis.biggest_snow_gains, DISPLAY_ROWS),
        |c: &Change| {
            let sign = if c.delta > 0.0 { "+" } else { "" };
            format!(
                "{} ({}): {}{}\" (was {}\", now {}\")",
                c.display_name,
                region(&c.region_id),
                sign,
                c.delta,
                c.value_before,
                c.value_after
            )
        },
    );
    out.section(
        "BIGGEST TRAIL OPENINGS VS YESTERDAY:",
        head(&analysis.biggest_trail_openings, DISPLAY_ROWS),
        |c: &Change| {
            format!(
                "{} ({}): +{} trails (was {}, now {})",
                c.display_name,
                region(&c.region_id),
                c.delta,
                c.value_before,
                c.value_after
            )
        },
    );
    out.section(
        "BIGGEST LIFT OPENINGS VS YESTERDAY:",
        head(&analysis.biggest_lift_openings, DISPLAY_ROWS),
        |c: &Change| {
            format!(
                "{} ({}): +{} lifts (was {}, now {})",
                c.display_name,
                region(&c.region_id),
                c.delta,
                c.value_before,
                c.value_after
            )
        },
    );

    let weekly_gains: Vec<&Change> = analysis
        .week_over_week_trends
        .iter()
        .filter(|c| c.delta > 0.0)
        .take(WEEK_DISPLAY_ROWS)
        .collect();
    out.section("BIGGEST SEASON TOTAL GAINS VS 1 WEEK AGO:", &weekly_gains, |c| {
        format!(
            "{} ({}): +{}\" in the past week (now {}\" season total)",
            c.display_name,
            region(&c.region_id),
            c.delta,
            c.value_after
        )
    });

    out.section("POWDER ALERTS:", &analysis.powder_alerts, |a| {
        format!("{} ({}): {}\" {}", a.display_name, region(&a.region_id), a.inches, a.timeframe)
    });
    out.section("MILESTONES:", &analysis.milestones, |m| {
        format!("{}: {}", m.display_name, m.description())
    });

    out.lines.join("\n")
}
