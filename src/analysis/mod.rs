//! Analysis Core - daily ranking and event detection
//!
//! Turns one day of resort rankings, plus the snapshots from the day before
//! and the week before, into a `DayAnalysis` and its prompt text.
//!
//! # Architecture
//!
//! ```text
//! Snapshot (today) ─┬─ top_n()                    → top lists per metric
//!                   ├─ build_regional_aggregates() → per-region averages
//!                   └─ EventDetector::powder_alerts()
//! Snapshot (today) + Snapshot (yesterday / week ago)
//!                   ├─ find_changes()             → day-over-day, week-over-week
//!                   └─ EventDetector::milestones()
//!     ↓
//! DayAnalysis → format_for_prompt()
//! ```
//!
//! Nothing in here performs I/O except `RankingEngine::analyze`, which reads
//! the three snapshots from a `TimeSeriesStore` before delegating to the pure
//! `RankingEngine::analyze_snapshots`.

pub mod detector;
pub mod engine;
pub mod format;
pub mod ranking;
pub mod types;

pub use detector::EventDetector;
pub use engine::{AnalysisError, RankingEngine};
pub use format::format_for_prompt;
pub use ranking::{build_regional_aggregates, find_changes, top_n};
pub use types::{
    AlertTimeframe, Change, DayAnalysis, Metric, Milestone, MilestoneKind, PowderAlert,
    RankingItem, RegionalAggregate, Snapshot,
};
