//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.
//!
//! ```text
//!  IDLE ──[active, rest elapsed]──▶ FADING_IN ──[fade done]──▶ HOLDING
//!    ▲                                  │                         │
//!    │                             [inactive]        [on_duration or inactive]
//!    │                                  ▼                         │
//!    └────────[fade done, rest armed]── FADING_OUT ◀──────────────┘
//!
//!  Any state ──[flush_on]──▶ FLUSHING ──[flush off]──▶ IDLE
//! ```
//!
//! Handlers only decide; the fader turns their decisions into speeds and
//! the caller commits `fader.tick(now)` to the output after every tick.

use super::context::PumpContext;
use super::{Phase, StateDescriptor};
use crate::control::rest_period_ms;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; Phase::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: Phase::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: FadingIn
        StateDescriptor {
            id: Phase::FadingIn,
            name: "FadingIn",
            on_enter: Some(fading_in_enter),
            on_exit: None,
            on_update: fading_in_update,
        },
        // Index 2: Holding
        StateDescriptor {
            id: Phase::Holding,
            name: "Holding",
            on_enter: Some(holding_enter),
            on_exit: None,
            on_update: holding_update,
        },
        // Index 3: FadingOut
        StateDescriptor {
            id: Phase::FadingOut,
            name: "FadingOut",
            on_enter: Some(fading_out_enter),
            on_exit: None,
            on_update: fading_out_update,
        },
        // Index 4: Flushing
        StateDescriptor {
            id: Phase::Flushing,
            name: "Flushing",
            on_enter: Some(flushing_enter),
            on_exit: Some(flushing_exit),
            on_update: flushing_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state: pump at minimum, waiting for activation and rest
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &mut PumpContext) -> Option<Phase> {
    if ctx.flush_requested() {
        return Some(Phase::Flushing);
    }

    if !ctx.activation() {
        // No fade on deactivation; a later activation starts fresh.
        ctx.rest_until_ms = None;
        ctx.fader.set_immediate(ctx.config.pump_speed_min);
        return None;
    }

    if ctx.rest_elapsed() {
        return Some(Phase::FadingIn);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FADING_IN state: ramp from the current speed to max
// ═══════════════════════════════════════════════════════════════════════════

fn fading_in_enter(ctx: &mut PumpContext) {
    ctx.cycle_started_ms = Some(ctx.now_ms);
    ctx.rest_until_ms = None;
    ctx.fader
        .begin(ctx.config.pump_speed_max, ctx.config.fade_time_ms, ctx.now_ms);
    debug!(
        "FADING_IN: {:.2} -> {:.2} over {} ms",
        ctx.fader.current(),
        ctx.config.pump_speed_max,
        ctx.config.fade_time_ms
    );
}

fn fading_in_update(ctx: &mut PumpContext) -> Option<Phase> {
    if ctx.flush_requested() {
        return Some(Phase::Flushing);
    }

    // Preempt: turn around from wherever the ramp got to.
    if !ctx.activation() {
        return Some(Phase::FadingOut);
    }

    if !ctx.fader.is_active() {
        return Some(Phase::Holding);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOLDING state: max speed for on_duration
// ═══════════════════════════════════════════════════════════════════════════

fn holding_enter(ctx: &mut PumpContext) {
    ctx.fader.set_immediate(ctx.config.pump_speed_max);
}

fn holding_update(ctx: &mut PumpContext) -> Option<Phase> {
    if ctx.flush_requested() {
        return Some(Phase::Flushing);
    }

    if !ctx.activation() || ctx.ms_in_phase() >= ctx.config.on_duration_ms as u64 {
        return Some(Phase::FadingOut);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FADING_OUT state: ramp down to min, then arm the rest period
// ═══════════════════════════════════════════════════════════════════════════

fn fading_out_enter(ctx: &mut PumpContext) {
    ctx.fader
        .begin(ctx.config.pump_speed_min, ctx.config.fade_time_ms, ctx.now_ms);
}

fn fading_out_update(ctx: &mut PumpContext) -> Option<Phase> {
    if ctx.flush_requested() {
        return Some(Phase::Flushing);
    }

    if !ctx.fader.is_active() {
        let rest = rest_period_ms(&ctx.config);
        ctx.rest_until_ms = Some(ctx.now_ms + rest as u64);
        debug!("FADING_OUT: done, resting {} ms", rest);
        return Some(Phase::Idle);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FLUSHING state: max speed, no fade, overrides everything
// ═══════════════════════════════════════════════════════════════════════════

fn flushing_enter(ctx: &mut PumpContext) {
    ctx.fader.set_immediate(ctx.config.pump_speed_max);
    info!("FLUSH: mode on, pump at {:.2}", ctx.config.pump_speed_max);
}

fn flushing_exit(ctx: &mut PumpContext) {
    // Normal evaluation resumes from the flush speed with no pacing debt.
    ctx.rest_until_ms = None;
    info!("FLUSH: mode off");
}

fn flushing_update(ctx: &mut PumpContext) -> Option<Phase> {
    if !ctx.flush_requested() {
        return Some(Phase::Idle);
    }

    // Track pump_speed_max edits made while flushing.
    ctx.fader.set_immediate(ctx.config.pump_speed_max);
    None
}
