//! skiflow - ski resort snapshot analysis and cadence-scheduled publishing
//!
//! - `analysis`: rankings, regional aggregates, deltas, powder alerts, milestones
//! - `store`: SQLite-backed snapshot store and content queue
//! - `fetcher`: daily aggregate download and backfill
//! - `publisher`: outbound publish seam
//! - `scheduler`: windowed, interval-gated queue draining

pub mod analysis;
pub mod config;
pub mod fetcher;
pub mod publisher;
pub mod scheduler;
pub mod store;
