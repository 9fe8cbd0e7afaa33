//! Blocking pump controller for hosts with a dedicated worker thread.
//!
//! [`BlockingController::run_forever`] owns its thread: it reads a config
//! snapshot, picks a mode, and sleeps through fades, holds and rests.
//!
//! ```text
//!   ┌─▶ read snapshot ──▶ (re)open output if pump_pin changed
//!   │        │
//!   │   flush_on ───────▶ max, pause 500 ms
//!   │   schedule|manual ─▶ fade in ▸ hold ▸ fade out ▸ rest
//!   │   otherwise ──────▶ min, pause 500 ms
//!   │        │
//!   └── error? hardware init: back off 5 s · other: back off 1 s
//! ```
//!
//! A started cycle always runs to completion; config changes are seen at
//! the next snapshot read.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info};

use crate::config::PumpConfig;
use crate::control::fader::Fader;
use crate::control::rest_period_ms;
use crate::error::{Error, Result};
use crate::fsm::Phase;
use crate::schedule::is_schedule_active;
use crate::store::ConfigStore;

use super::events::AppEvent;
use super::ports::{Clock, EventSink, OutputFactory, PumpOutput, WallClock};
use super::status::RuntimeStatus;

/// Pause between iterations when idle or flushing.
pub const IDLE_POLL_MS: u64 = 500;
/// Backoff after a hardware-init failure.
pub const HARDWARE_RETRY_MS: u64 = 5000;
/// Backoff after any other iteration failure.
pub const ERROR_RETRY_MS: u64 = 1000;
/// Longest uninterrupted sleep; bounds shutdown latency.
const PAUSE_SLICE_MS: u64 = 100;

/// Open output plus the pin it was opened for.
type Slot<O> = Option<(u8, O)>;

pub struct BlockingController<F: OutputFactory, C: Clock, W: WallClock, S: EventSink> {
    store: Arc<ConfigStore>,
    factory: F,
    clock: C,
    wall: W,
    sink: S,
    status: Arc<RuntimeStatus>,
    shutdown: Arc<AtomicBool>,
    output: Slot<F::Output>,
    fader: Fader,
    phase: Phase,
    last_logged_phase: Option<Phase>,
}

impl<F, C, W, S> BlockingController<F, C, W, S>
where
    F: OutputFactory,
    C: Clock,
    W: WallClock,
    S: EventSink,
{
    pub fn new(store: Arc<ConfigStore>, factory: F, clock: C, wall: W, sink: S) -> Self {
        Self {
            store,
            factory,
            clock,
            wall,
            sink,
            status: Arc::new(RuntimeStatus::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            output: None,
            fader: Fader::new(0.0),
            phase: Phase::Idle,
            last_logged_phase: None,
        }
    }

    /// Share an existing status cell (e.g. with a status reader).
    pub fn with_status(mut self, status: Arc<RuntimeStatus>) -> Self {
        self.status = status;
        self
    }

    /// Share an existing shutdown flag (e.g. with a signal handler).
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn status(&self) -> Arc<RuntimeStatus> {
        Arc::clone(&self.status)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    // ── Supervised loop ───────────────────────────────────────

    /// Run until the shutdown flag is raised.  Iteration errors are
    /// logged and backed off; they never end the loop.  On exit the pump
    /// is stopped and the output released.
    pub fn run_forever(&mut self) {
        info!("Pump controller started");
        self.sink.emit(&AppEvent::Started(self.phase));

        while !self.shutdown_requested() {
            if let Err(e) = self.run_once() {
                let backoff = if e.is_hardware_init() {
                    HARDWARE_RETRY_MS
                } else {
                    ERROR_RETRY_MS
                };
                error!("Pump loop: {} (retrying in {} ms)", e, backoff);
                self.sink.emit(&AppEvent::OutputFault(e));
                self.pause(backoff);
            }
        }

        self.stop();
        info!("Pump controller stopped");
    }

    /// One iteration: flush pulse, one full cycle, or one idle pulse.
    pub fn run_once(&mut self) -> Result<()> {
        let mut slot = self.output.take();
        let result = self.iterate(&mut slot);
        self.output = slot;
        result
    }

    /// Command speed 0 and release the output.
    pub fn stop(&mut self) {
        if let Some((pin, mut out)) = self.output.take() {
            if let Err(e) = out.set_speed(0.0) {
                error!("Pump stop on pin {}: {}", pin, e);
            }
            out.close();
            self.fader.set_immediate(0.0);
            self.status.set_speed(0.0);
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn iterate(&mut self, slot: &mut Slot<F::Output>) -> Result<()> {
        let cfg = self.store.read();
        let out = self.ensure_output(slot, cfg.pump_pin)?;

        if cfg.flush_on {
            self.enter_phase(Phase::Flushing);
            self.commit(out, cfg.pump_speed_max)?;
            self.pause(IDLE_POLL_MS);
            return Ok(());
        }
        if self.phase == Phase::Flushing {
            // Leave flush without touching the speed.
            self.enter_phase(Phase::Idle);
        }

        let schedule_active = self
            .wall
            .local_now()
            .is_some_and(|now| is_schedule_active(&cfg, now.time, now.weekday));

        if schedule_active || cfg.manual_on {
            self.run_cycle(out, &cfg)
        } else {
            self.enter_phase(Phase::Idle);
            self.commit(out, cfg.pump_speed_min)?;
            self.pause(IDLE_POLL_MS);
            Ok(())
        }
    }

    /// Fade in from the current speed, hold, fade out, rest.
    fn run_cycle(&mut self, out: &mut F::Output, cfg: &PumpConfig) -> Result<()> {
        self.enter_phase(Phase::FadingIn);
        let from = self.fader.current();
        self.fade(out, from, cfg.pump_speed_max, cfg.fade_time_ms)?;

        self.enter_phase(Phase::Holding);
        if !self.pause(cfg.on_duration_ms as u64) {
            return Ok(());
        }

        self.enter_phase(Phase::FadingOut);
        self.fade(out, cfg.pump_speed_max, cfg.pump_speed_min, cfg.fade_time_ms)?;

        self.enter_phase(Phase::Idle);
        self.pause(rest_period_ms(cfg) as u64);
        Ok(())
    }

    /// Make sure `slot` holds an output for `pin`, replacing a stale one.
    fn ensure_output<'a>(
        &mut self,
        slot: &'a mut Slot<F::Output>,
        pin: u8,
    ) -> Result<&'a mut F::Output> {
        if slot.as_ref().is_some_and(|(open_pin, _)| *open_pin != pin) {
            if let Some((old_pin, mut old)) = slot.take() {
                info!("Pump output: pin {} -> {}, reopening", old_pin, pin);
                old.close();
            }
        }

        let (_, out) = match slot.take() {
            Some(open) => slot.insert(open),
            None => {
                let out = self.factory.open(pin).map_err(|e| match e {
                    Error::Output(o) => Error::HardwareInit(o),
                    other => other,
                })?;
                info!("Pump output: opened on pin {}", pin);
                self.sink.emit(&AppEvent::OutputOpened { pin });
                self.fader.set_immediate(out.speed());
                slot.insert((pin, out))
            }
        };
        Ok(out)
    }

    fn commit(&mut self, out: &mut F::Output, speed: f32) -> Result<()> {
        out.set_speed(speed)?;
        self.fader.set_immediate(out.speed());
        self.status.set_speed(out.speed());
        Ok(())
    }

    fn fade(&mut self, out: &mut F::Output, from: f32, to: f32, duration_ms: u32) -> Result<()> {
        let mut tracked = Tracked {
            inner: out,
            status: &self.status,
        };
        self.fader
            .step_blocking(&mut tracked, &self.clock, from, to, duration_ms)
    }

    /// Record the phase; log and emit only when it differs from the last
    /// one logged.
    fn enter_phase(&mut self, phase: Phase) {
        let from = self.phase;
        self.phase = phase;
        self.status.set_phase(phase);
        if self.last_logged_phase != Some(phase) {
            info!("PUMP phase: {} -> {}", from, phase);
            self.last_logged_phase = Some(phase);
            if from != phase {
                self.sink.emit(&AppEvent::PhaseChanged { from, to: phase });
            }
        }
    }

    /// Sleep in slices, returning `false` early if shutdown was requested.
    fn pause(&self, ms: u64) -> bool {
        let mut left = ms;
        while left > 0 {
            if self.shutdown_requested() {
                return false;
            }
            let slice = left.min(PAUSE_SLICE_MS);
            self.clock.sleep_ms(slice);
            left -= slice;
        }
        !self.shutdown_requested()
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Output wrapper that mirrors every committed speed into [`RuntimeStatus`].
struct Tracked<'a, O: PumpOutput> {
    inner: &'a mut O,
    status: &'a RuntimeStatus,
}

impl<O: PumpOutput> PumpOutput for Tracked<'_, O> {
    fn set_speed(&mut self, speed: f32) -> Result<()> {
        self.inner.set_speed(speed)?;
        self.status.set_speed(self.inner.speed());
        Ok(())
    }

    fn speed(&self) -> f32 {
        self.inner.speed()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
