//! Schedule window evaluation.
//!
//! ```text
//!   enabled? ──no──▶ inactive
//!      │
//!   day in active_days? ──no──▶ inactive
//!      │
//!   window parses? ──no──▶ inactive (fail closed)
//!      │
//!   start <= end :  start <= now <= end
//!   start >  end :  now >= start || now <= end   (wraps midnight)
//! ```
//!
//! Pure function of its inputs; safe to call from any context, including
//! the timer tick.

use log::debug;

use crate::config::{PumpConfig, TimeOfDay, Weekday};

/// Inclusive time-of-day window that may wrap past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl ScheduleWindow {
    /// `true` if the window spans midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Check if `now` falls inside the window (both bounds inclusive).
    pub fn contains(&self, now: TimeOfDay) -> bool {
        if self.start <= self.end {
            // e.g. 08:00..17:00
            now >= self.start && now <= self.end
        } else {
            // e.g. 22:00..06:00
            now >= self.start || now <= self.end
        }
    }
}

/// Whether automatic activation is permitted at `now` on `weekday`.
///
/// Manual and flush overrides are not considered here.
pub fn is_schedule_active(cfg: &PumpConfig, now: TimeOfDay, weekday: Weekday) -> bool {
    if !cfg.enabled {
        return false;
    }
    if !cfg.active_days.contains(weekday) {
        return false;
    }
    let Some((start, end)) = cfg.schedule_window() else {
        // Reported once at load time; this runs on every tick.
        debug!(
            "Schedule: malformed window '{}'..'{}', treating as inactive",
            cfg.start_time, cfg.end_time
        );
        return false;
    };
    ScheduleWindow { start, end }.contains(now)
}
