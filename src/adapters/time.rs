//! Time adapters.
//!
//! - [`SystemClock`] implements [`Clock`]: monotonic milliseconds since
//!   construction plus a blocking sleep.
//! - [`LocalWallClock`] implements [`WallClock`]: local weekday and
//!   time-of-day for schedule evaluation.
//!
//! On `target_os = "espidf"` the monotonic source is `esp_timer_get_time()`
//! and local time comes from `localtime_r`; wall time is reported as
//! unknown until SNTP has set the clock.  On the host, `std::time::Instant`
//! and `chrono::Local` are used.

use crate::app::ports::{Clock, LocalTime, WallClock};
#[cfg(not(target_os = "espidf"))]
use crate::config::{TimeOfDay, Weekday};

/// Monotonic clock.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64 / 1000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
}

/// Local wall clock.
#[derive(Default)]
pub struct LocalWallClock;

impl LocalWallClock {
    pub fn new() -> Self {
        Self
    }
}

impl WallClock for LocalWallClock {
    #[cfg(target_os = "espidf")]
    fn local_now(&self) -> Option<LocalTime> {
        use crate::config::{TimeOfDay, Weekday};
        use core::ptr;

        let mut tv = esp_idf_sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (before 2020-01-01)
        const EPOCH_2020: i64 = 1_577_836_800;
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_sys::time_t;
        let mut tm: esp_idf_sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        // tm_wday counts from Sunday.
        let monday_index = u32::try_from((tm.tm_wday + 6) % 7).ok()?;
        let weekday = Weekday::from_monday_index(monday_index)?;
        let time = TimeOfDay::from_hms(
            u8::try_from(tm.tm_hour).ok()?,
            u8::try_from(tm.tm_min).ok()?,
            u8::try_from(tm.tm_sec).ok()?.min(59),
        )?;
        Some(LocalTime { weekday, time })
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_now(&self) -> Option<LocalTime> {
        local_time_of(&chrono::Local::now())
    }
}

/// Convert any chrono timestamp into a [`LocalTime`].
#[cfg(not(target_os = "espidf"))]
pub fn local_time_of<T>(at: &T) -> Option<LocalTime>
where
    T: chrono::Datelike + chrono::Timelike,
{
    let weekday = Weekday::from_monday_index(at.weekday().num_days_from_monday())?;
    let time = TimeOfDay::from_hms(at.hour() as u8, at.minute() as u8, at.second().min(59) as u8)?;
    Some(LocalTime { weekday, time })
}
