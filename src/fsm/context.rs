//! Shared mutable context threaded through every FSM handler.
//!
//! `PumpContext` is the single struct that state handlers read from and
//! write to: the config snapshot for this tick, the schedule verdict,
//! the fader, and cycle timing.  It is owned by the controller and never
//! shared across threads.

use std::sync::Arc;

use crate::config::PumpConfig;
use crate::control::fader::Fader;

/// The shared context passed to every state handler function.
pub struct PumpContext {
    // -- Timing --
    /// Monotonic time of the current tick (milliseconds).
    pub now_ms: u64,
    /// When the current phase was entered.
    pub phase_started_ms: u64,
    /// When the most recent fade-in began.
    pub cycle_started_ms: Option<u64>,
    /// Earliest time the next cycle may start.  `None` means no pacing
    /// constraint (fresh activation).
    pub rest_until_ms: Option<u64>,
    /// Ticks elapsed since the current phase was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,

    // -- Inputs --
    /// Configuration snapshot for this tick.
    pub config: Arc<PumpConfig>,
    /// Schedule verdict for this tick.
    pub schedule_active: bool,

    // -- Output --
    /// Produces the speed committed after each tick.
    pub fader: Fader,
}

impl PumpContext {
    /// Create a new context.  The fader starts at the configured minimum.
    pub fn new(config: Arc<PumpConfig>, now_ms: u64) -> Self {
        Self {
            now_ms,
            phase_started_ms: now_ms,
            cycle_started_ms: None,
            rest_until_ms: None,
            ticks_in_state: 0,
            total_ticks: 0,
            fader: Fader::new(config.pump_speed_min),
            schedule_active: false,
            config,
        }
    }

    /// Schedule or manual override wants the pump cycling.
    pub fn activation(&self) -> bool {
        self.schedule_active || self.config.manual_on
    }

    pub fn flush_requested(&self) -> bool {
        self.config.flush_on
    }

    /// Milliseconds since the current phase was entered.
    pub fn ms_in_phase(&self) -> u64 {
        self.now_ms.saturating_sub(self.phase_started_ms)
    }

    /// `true` once the post-cycle rest has elapsed (or none is pending).
    pub fn rest_elapsed(&self) -> bool {
        self.rest_until_ms.is_none_or(|until| self.now_ms >= until)
    }
}
