//! Tick-driven pump service: the hexagonal core for timer-driven targets.
//!
//! [`PumpService`] owns the FSM and its context.  Every call to
//! [`tick`](PumpService::tick) is short and never blocks: evaluate the
//! schedule, advance the FSM, advance the fader, commit the speed.  All
//! I/O flows through port traits injected at call sites.
//!
//! ```text
//!  ConfigStore ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!   WallClock  ──▶ │       PumpService        │
//!                  │  Schedule · FSM · Fader  │ ──▶ PumpOutput
//!                  └──────────────────────────┘
//! ```

use std::sync::Arc;

use log::info;

use crate::config::PumpConfig;
use crate::error::Result;
use crate::fsm::context::PumpContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, Phase};
use crate::schedule::is_schedule_active;

use super::events::AppEvent;
use super::ports::{EventSink, LocalTime, PumpOutput};

/// The tick-model pump controller.
pub struct PumpService {
    fsm: Fsm,
    ctx: PumpContext,
    /// Last speed written to the output; `None` forces a write.
    committed: Option<f32>,
    tick_count: u64,
}

impl PumpService {
    /// Construct the service from an initial snapshot.
    ///
    /// Does **not** start the FSM: call [`start`](Self::start) next.
    pub fn new(config: Arc<PumpConfig>, now_ms: u64) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), Phase::Idle),
            ctx: PumpContext::new(config, now_ms),
            committed: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in Idle.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("PumpService started in {}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control tick against `config`.
    ///
    /// `wall` is `None` while the wall clock is unsynced; the schedule
    /// then counts as inactive.  The output is written only when the
    /// speed changes, and a failed write is retried on the next tick.
    pub fn tick(
        &mut self,
        config: Arc<PumpConfig>,
        now_ms: u64,
        wall: Option<LocalTime>,
        out: &mut impl PumpOutput,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        self.tick_count += 1;
        let prev = self.fsm.current_state();

        // 1. Inputs
        self.ctx.schedule_active =
            wall.is_some_and(|w| is_schedule_active(&config, w.time, w.weekday));
        self.ctx.config = config;
        self.ctx.now_ms = now_ms;

        // 2. FSM decides
        self.fsm.tick(&mut self.ctx);

        // 3. Fader produces the speed for this instant
        let speed = self.ctx.fader.tick(now_ms);

        let phase = self.fsm.current_state();
        if phase != prev {
            sink.emit(&AppEvent::PhaseChanged {
                from: prev,
                to: phase,
            });
        }

        // 4. Commit
        if self.committed != Some(speed) {
            out.set_speed(speed)?;
            self.committed = Some(speed);
            sink.emit(&AppEvent::SpeedCommitted(speed));
        }
        Ok(())
    }

    /// Forget the last committed speed so the next tick writes the
    /// output even if the speed is unchanged (after reopening it).
    pub fn output_replaced(&mut self) {
        self.committed = None;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.fsm.current_state()
    }

    /// Speed produced by the most recent tick.
    pub fn current_speed(&self) -> f32 {
        self.ctx.fader.current()
    }

    /// Schedule verdict from the most recent tick.
    pub fn schedule_active(&self) -> bool {
        self.ctx.schedule_active
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
