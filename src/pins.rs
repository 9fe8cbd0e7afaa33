//! GPIO / peripheral pin assignments for the Watershed pump board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Pump motor driver (L298N-style H-bridge)
// ---------------------------------------------------------------------------

/// Enable input, driven by LEDC PWM for speed control.  Default `pump_pin`.
pub const PUMP_PWM_GPIO: i32 = 18;
/// IN1: HIGH while the pump runs.
pub const PUMP_IN1_GPIO: i32 = 21;
/// IN2: held LOW (single direction).
pub const PUMP_IN2_GPIO: i32 = 20;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  10-bit gives 0 – 1023 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 10;
/// PWM base frequency for the pump motor.
pub const PUMP_PWM_FREQ_HZ: u32 = 1_000;

// ---------------------------------------------------------------------------
// Linux sysfs PWM (host target)
// ---------------------------------------------------------------------------

/// PWM period for sysfs outputs (1 kHz).
pub const SYSFS_PWM_PERIOD_NS: u64 = 1_000_000;

/// sysfs PWM channel for a BCM pin, if it has one on `pwmchip0`.
pub const fn sysfs_pwm_channel(pin: u8) -> Option<u8> {
    match pin {
        12 | 18 => Some(0),
        13 | 19 => Some(1),
        _ => None,
    }
}
