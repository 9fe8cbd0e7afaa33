//! Actuator drivers, timers, and the hardware watchdog.

pub mod hw_init;
pub mod hw_timer;
pub mod pump;
pub mod watchdog;
