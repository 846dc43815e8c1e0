//! Slot arithmetic
//!
//! Slots are `window_open + k * interval` for k = 0, 1, 2, ... and only exist
//! while the hour is below `end_hour`. Seconds are ignored throughout.

use super::ScheduleConfig;
use chrono::{Days, Duration, NaiveDateTime, Timelike};
use std::time::Duration as StdDuration;

/// Grace at the reference 60s poll
const BASE_GRACE_MINUTES: f64 = 2.0;
const REFERENCE_POLL_SECS: f64 = 60.0;

/// Earliest slot at or after `from`
///
/// Before the window this is today's open; at or past `end_hour`, or when the
/// next multiple of the interval falls outside the window, it is tomorrow's
/// open.
pub fn next_slot(config: &ScheduleConfig, from: NaiveDateTime) -> NaiveDateTime {
    let today = from.date();
    let tomorrow_open = config.window_open(today + Days::new(1));

    if from.hour() < config.start_hour() {
        return config.window_open(today);
    }
    if from.hour() >= config.end_hour() {
        return tomorrow_open;
    }

    let elapsed = elapsed_minutes(config, from) as f64;
    let interval = config.interval_minutes();
    let slot_index = (elapsed / interval).ceil();
    let offset_secs = (slot_index * interval * 60.0).round() as i64;
    let candidate = config.window_open(today) + Duration::seconds(offset_secs);

    if candidate.date() != today || candidate.hour() >= config.end_hour() {
        tomorrow_open
    } else {
        candidate
    }
}

/// Minutes past the most recent slot boundary
pub fn minutes_into_slot(config: &ScheduleConfig, now: NaiveDateTime) -> f64 {
    elapsed_minutes(config, now) as f64 % config.interval_minutes()
}

/// How far past a slot a tick may land and still count as on-slot
///
/// Two minutes at a 60s poll, scaled linearly with the poll interval.
pub fn grace_minutes(poll_interval: StdDuration) -> f64 {
    BASE_GRACE_MINUTES * poll_interval.as_secs_f64() / REFERENCE_POLL_SECS
}

fn elapsed_minutes(config: &ScheduleConfig, t: NaiveDateTime) -> i64 {
    (t.hour() as i64 - config.start_hour() as i64) * 60 + t.minute() as i64
}
