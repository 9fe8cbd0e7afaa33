//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the control tick
//! stalls for more than [`WATCHDOG_TIMEOUT_MS`].
//!
//! The tick driver feeds it, through [`LivenessPort`], once per control
//! tick and from nowhere else.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

use log::info;

use crate::app::ports::LivenessPort;

/// Reset deadline.  Fifty control ticks of headroom at 10 Hz.
pub const WATCHDOG_TIMEOUT_MS: u32 = 5000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    feeds: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!(
                        "Watchdog: subscribed ({}ms timeout, panic on trigger)",
                        WATCHDOG_TIMEOUT_MS
                    );
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed, feeds: 0 }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op");
            Self { feeds: 0 }
        }
    }

    /// Number of feeds since construction.
    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}

impl LivenessPort for Watchdog {
    fn feed(&mut self) {
        self.feeds += 1;
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}
