//! Speed fader with two drive strategies.
//!
//! ```text
//!   blocking:  start ──step──step──step── … ──▶ end     (sleeps between steps)
//!   tick:      begin(target) ─ tick(now) ─ tick(now) ─ … ─▶ target
//! ```
//!
//! Both strategies interpolate linearly and clamp every value they commit
//! to `[0.0, 1.0]` and to the `[start, end]` segment, so rounding can never
//! overshoot the boundary steps.  The fader remembers the last speed it
//! produced; a new `begin()` always starts from that value, so re-targeting
//! mid-fade continues from where the pump actually is.

use crate::app::ports::{Clock, PumpOutput};
use crate::control::clamp_speed;
use crate::error::Result;

/// Lower bound on interpolation steps for the blocking fade.
pub const MIN_FADE_STEPS: u32 = 10;
/// Target step period for the blocking fade (milliseconds).
pub const FADE_STEP_PERIOD_MS: u32 = 20;

/// Number of steps the blocking strategy uses for `duration_ms`.
pub fn blocking_steps(duration_ms: u32) -> u32 {
    (duration_ms / FADE_STEP_PERIOD_MS).max(MIN_FADE_STEPS)
}

/// Offset of step `i` of `steps` from the start of a `duration_ms` fade.
fn step_offset_ms(duration_ms: u32, i: u32, steps: u32) -> u64 {
    duration_ms as u64 * i as u64 / steps as u64
}

/// Interpolate `from → to` at `progress` (0..=1), clamped to the segment.
fn lerp(from: f32, to: f32, progress: f32) -> f32 {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    clamp_speed((from + (to - from) * progress).clamp(lo, hi))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    started_ms: u64,
    duration_ms: u64,
}

/// Single in-flight fade plus the last produced speed.
#[derive(Debug, Clone, Default)]
pub struct Fader {
    current: f32,
    fade: Option<Fade>,
}

impl Fader {
    pub fn new(initial: f32) -> Self {
        Self {
            current: clamp_speed(initial),
            fade: None,
        }
    }

    /// Last speed produced by either strategy.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// `true` while a tick-driven fade is in flight.
    pub fn is_active(&self) -> bool {
        self.fade.is_some()
    }

    /// Target of the in-flight fade, if any.
    pub fn target(&self) -> Option<f32> {
        self.fade.map(|f| f.to)
    }

    /// Drop any fade and jump straight to `speed`.
    pub fn set_immediate(&mut self, speed: f32) {
        self.fade = None;
        self.current = clamp_speed(speed);
    }

    // ── Tick-driven strategy ──────────────────────────────────

    /// Start fading toward `target`, rebased on the current speed.
    ///
    /// Replaces any fade already in flight.
    pub fn begin(&mut self, target: f32, duration_ms: u32, now_ms: u64) {
        self.fade = Some(Fade {
            from: self.current,
            to: clamp_speed(target),
            started_ms: now_ms,
            duration_ms: duration_ms as u64,
        });
    }

    /// Advance the in-flight fade to `now_ms` and return the speed to command.
    ///
    /// Once the duration has elapsed the target is committed exactly and the
    /// fade is cleared.  Without a fade this returns the current speed.
    pub fn tick(&mut self, now_ms: u64) -> f32 {
        if let Some(fade) = self.fade {
            let elapsed = now_ms.saturating_sub(fade.started_ms);
            if elapsed >= fade.duration_ms {
                self.current = fade.to;
                self.fade = None;
            } else {
                let progress = elapsed as f32 / fade.duration_ms as f32;
                self.current = lerp(fade.from, fade.to, progress);
            }
        }
        self.current
    }

    // ── Blocking strategy ─────────────────────────────────────

    /// Ramp `output` from `start` to `end` over `duration_ms`, sleeping on
    /// `clock` between steps.  Zero duration commits `end` directly.
    ///
    /// The final step always commits `end` exactly.
    pub fn step_blocking(
        &mut self,
        output: &mut impl PumpOutput,
        clock: &impl Clock,
        start: f32,
        end: f32,
        duration_ms: u32,
    ) -> Result<()> {
        self.fade = None;
        let start = clamp_speed(start);
        let end = clamp_speed(end);

        if duration_ms == 0 {
            output.set_speed(end)?;
            self.current = end;
            return Ok(());
        }

        let steps = blocking_steps(duration_ms);
        let started_ms = clock.now_ms();

        for i in 0..=steps {
            let value = if i == steps {
                end
            } else {
                lerp(start, end, i as f32 / steps as f32)
            };
            output.set_speed(value)?;
            self.current = value;
            if i < steps {
                // Deadlines are absolute so truncation and late wakeups
                // don't accumulate.
                let due_ms = started_ms + step_offset_ms(duration_ms, i + 1, steps);
                let now_ms = clock.now_ms();
                if due_ms > now_ms {
                    clock.sleep_ms(due_ms - now_ms);
                }
            }
        }
        Ok(())
    }
}
