//! Pump cycle state machine for the tick-driven runtime.
//!
//! One cycle is `Idle ▸ FadingIn ▸ Holding ▸ FadingOut ▸ Idle (rest)`;
//! `Flushing` can be entered from any phase and pins the pump at max.
//! Phases are rows in a fixed table of plain `fn` pointers:
//!
//! ```text
//!            active & rest over            fade done
//!   Idle ─────────────────────▶ FadingIn ─────────────▶ Holding
//!    ▲  ◀──── fade done ──── FadingOut ◀── on_duration ──┘
//!    │                          ▲
//!    │                          └──── inactive (from FadingIn/Holding)
//!    └── flush off ── Flushing ◀── flush_on (from any phase)
//! ```
//!
//! On every control tick the current phase's `on_update` looks at the
//! config snapshot, the schedule verdict and the clock in [`PumpContext`]
//! and may name the next phase.  A change runs the old phase's `on_exit`,
//! stamps `phase_started_ms`, then runs the new phase's `on_enter`, which
//! is where fades toward max or min get started.  The fader itself is
//! advanced by the caller after the FSM step.

pub mod context;
pub mod states;

use context::PumpContext;
use log::info;
use serde::{Deserialize, Serialize};

// ── Phases ────────────────────────────────────────────────────

/// Where the pump is in its cycle.  The discriminant is the row index in
/// [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    FadingIn = 1,
    Holding = 2,
    FadingOut = 3,
    Flushing = 4,
}

impl Phase {
    /// Number of phases (rows in the table).
    pub const COUNT: usize = 5;

    pub const ALL: [Phase; Self::COUNT] = [
        Self::Idle,
        Self::FadingIn,
        Self::Holding,
        Self::FadingOut,
        Self::Flushing,
    ];

    /// Phase for a table row.  An out-of-range row asserts in debug
    /// builds and falls back to `Idle` (pump at min) in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(phase) => *phase,
            None => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Idle
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::FadingIn => "FadingIn",
            Self::Holding => "Holding",
            Self::FadingOut => "FadingOut",
            Self::Flushing => "Flushing",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Table rows ────────────────────────────────────────────────

/// Phase entry/exit hook, e.g. starting a fade or arming the rest timer.
pub type StateActionFn = fn(&mut PumpContext);

/// Per-tick check; `Some(next)` leaves the phase.
pub type StateUpdateFn = fn(&mut PumpContext) -> Option<Phase>;

/// Hooks for one pump phase.
pub struct StateDescriptor {
    pub id: Phase,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ── Engine ────────────────────────────────────────────────────

/// Pump phase table plus the current phase and tick bookkeeping.
pub struct Fsm {
    table: [StateDescriptor; Phase::COUNT],
    current: usize,
    /// Control ticks since start.
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    /// Pump FSM parked in `initial`; call [`Fsm::start`] before ticking.
    pub fn new(table: [StateDescriptor; Phase::COUNT], initial: Phase) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Enter the initial phase (boot: `Idle`, so the pump settles at min).
    pub fn start(&mut self, ctx: &mut PumpContext) {
        info!("PUMP starting in phase: {}", self.table[self.current].name);
        ctx.phase_started_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// One control tick: let the current phase decide whether the pump
    /// moves on (flush request, fade finished, hold elapsed, rest over).
    pub fn tick(&mut self, ctx: &mut PumpContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump to `next` now, running the exit and entry hooks.  No-op if the
    /// pump is already there.
    pub fn force_transition(&mut self, next: Phase, ctx: &mut PumpContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Phase the pump is in.
    pub fn current_state(&self) -> Phase {
        Phase::from_index(self.current)
    }

    /// Control ticks spent in the current phase.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // ── Internal ──────────────────────────────────────────────

    fn transition(&mut self, next_id: Phase, ctx: &mut PumpContext) {
        let next_idx = next_id as usize;

        info!(
            "PUMP transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;
        ctx.phase_started_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
