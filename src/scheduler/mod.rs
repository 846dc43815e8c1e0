//! Cadence scheduler - drains the approved queue inside a daily window
//!
//! ```text
//! tokio interval (poll tick, default 60s)
//!     ↓
//! CadenceScheduler::check_and_post(now)
//!     ├─ outside [start_hour, end_hour)        → skip
//!     ├─ posted today, interval not elapsed    → skip
//!     ├─ nothing posted today, off slot        → skip
//!     └─ eligible → post_next()
//!             ↓
//!         oldest approved item → Publisher
//!             ├─ Ok  → status = posted, metadata += receipt + posted_at
//!             └─ Err → stays approved, retried on a later tick
//! ```
//!
//! All times are local wall-clock `NaiveDateTime`s supplied by the
//! scheduler's clock function, so tests can drive it deterministically.

pub mod cadence;
pub mod slots;

pub use cadence::{
    project_schedule, CadenceScheduler, CheckOutcome, Clock, PostOutcome, ScheduledItem,
    SchedulerHandle, SchedulerState, DEFAULT_POLL_INTERVAL, POSTED_AT_FORMAT,
};
pub use slots::{grace_minutes, minutes_into_slot, next_slot};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("interval_hours must be a positive number, got {0}")]
    InvalidInterval(f64),

    #[error("hours must be in 0..=23, got {0}")]
    InvalidHour(u32),

    #[error("start_hour ({start}) must be before end_hour ({end})")]
    EmptyWindow { start: u32, end: u32 },
}

/// Posting window and cadence
///
/// Validated on construction and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    interval_hours: f64,
    start_hour: u32,
    end_hour: u32,
}

impl ScheduleConfig {
    pub fn new(interval_hours: f64, start_hour: u32, end_hour: u32) -> Result<Self, ConfigError> {
        if !interval_hours.is_finite() || interval_hours <= 0.0 {
            return Err(ConfigError::InvalidInterval(interval_hours));
        }
        for hour in [start_hour, end_hour] {
            if hour > 23 {
                return Err(ConfigError::InvalidHour(hour));
            }
        }
        if start_hour >= end_hour {
            return Err(ConfigError::EmptyWindow {
                start: start_hour,
                end: end_hour,
            });
        }

        Ok(Self {
            interval_hours,
            start_hour,
            end_hour,
        })
    }

    pub fn interval_hours(&self) -> f64 {
        self.interval_hours
    }

    pub fn interval_minutes(&self) -> f64 {
        self.interval_hours * 60.0
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Window-open time on `date`
    pub fn window_open(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::hours(self.start_hour as i64)
    }

    pub fn in_window(&self, t: NaiveDateTime) -> bool {
        (self.start_hour..self.end_hour).contains(&t.hour())
    }
}

impl Default for ScheduleConfig {
    /// Every 90 minutes between 09:00 and 21:00
    fn default() -> Self {
        Self {
            interval_hours: 1.5,
            start_hour: 9,
            end_hour: 21,
        }
    }
}
