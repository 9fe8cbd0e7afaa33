//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! One periodic timer drives the whole embedded runtime: every
//! [`CONTROL_TICK_MS`] it pushes [`Event::ControlTick`], and every
//! [`TICKS_PER_CONFIG_CHECK`]th tick also [`Event::ConfigCheck`].
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely call push_event() which uses AtomicU8.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Control tick period.
pub const CONTROL_TICK_MS: u64 = 100;
/// Control ticks between config checks (1 Hz).
pub const TICKS_PER_CONFIG_CHECK: u8 = 10;

static TICKS_SINCE_CHECK: AtomicU8 = AtomicU8::new(0);

#[cfg(target_os = "espidf")]
static mut CONTROL_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// Body of the timer callback.
pub fn on_timer_tick() {
    push_event(Event::ControlTick);
    let n = TICKS_SINCE_CHECK.load(Ordering::Relaxed) + 1;
    if n >= TICKS_PER_CONFIG_CHECK {
        TICKS_SINCE_CHECK.store(0, Ordering::Relaxed);
        push_event(Event::ConfigCheck);
    } else {
        TICKS_SINCE_CHECK.store(n, Ordering::Relaxed);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    on_timer_tick();
}

/// Start the control tick timer (10 Hz).
#[cfg(target_os = "espidf")]
pub fn start_timers() {
    // SAFETY: CONTROL_TIMER is written here once at boot from the single
    // main-task context before any timer callbacks fire.  The callback
    // itself only calls push_event(), which is lock-free.
    unsafe {
        let control_args = esp_timer_create_args_t {
            callback: Some(control_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"pump\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&control_args, &raw mut CONTROL_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer create failed (rc={})", ret);
            return;
        }
        let ret = esp_timer_start_periodic(CONTROL_TIMER, CONTROL_TICK_MS * 1000);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer start failed (rc={})", ret);
            return;
        }

        info!("hw_timer: control@{}ms started", CONTROL_TICK_MS);
    }
}
