//! Pure control algorithms: speed clamping, cycle pacing, and the fader.
//!
//! Nothing in here touches hardware or clocks directly; time comes in as
//! millisecond timestamps and output goes out through
//! [`PumpOutput`](crate::app::ports::PumpOutput).

pub mod fader;

use crate::config::PumpConfig;

/// Minimum rest between the end of one cycle and the start of the next.
pub const REST_FLOOR_MS: u32 = 500;

/// Clamp a commanded speed into `[0.0, 1.0]`.  NaN maps to 0 (pump off).
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(0.0, 1.0)
    }
}

/// Time the pump rests after fading out so that cycle starts stay
/// `interval_ms` apart: `max(REST_FLOOR_MS, interval - (2 * fade + on))`.
pub fn rest_period_ms(cfg: &PumpConfig) -> u32 {
    let busy = cfg
        .fade_time_ms
        .saturating_mul(2)
        .saturating_add(cfg.on_duration_ms);
    cfg.interval_ms.saturating_sub(busy).max(REST_FLOOR_MS)
}
