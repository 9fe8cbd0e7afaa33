//! Lock-free publication of the controller's live state.
//!
//! The controller is the only writer.  Readers on other threads (status
//! queries, the CLI) load the atomics without ever blocking it.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::fsm::Phase;

/// Phase and speed read together, for handing to another process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub phase: Phase,
    pub speed: f32,
}

#[derive(Debug)]
pub struct RuntimeStatus {
    phase: AtomicU8,
    /// `f32::to_bits` of the last committed speed.
    speed_bits: AtomicU32,
}

impl RuntimeStatus {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Idle as u8),
            speed_bits: AtomicU32::new(0f32.to_bits()),
        }
    }

    pub fn publish(&self, phase: Phase, speed: f32) {
        self.phase.store(phase as u8, Ordering::Relaxed);
        self.speed_bits.store(speed.to_bits(), Ordering::Relaxed);
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub fn set_speed(&self, speed: f32) {
        self.speed_bits.store(speed.to_bits(), Ordering::Relaxed);
    }

    pub fn phase(&self) -> Phase {
        Phase::from_index(self.phase.load(Ordering::Relaxed) as usize)
    }

    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed_bits.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            phase: self.phase(),
            speed: self.speed(),
        }
    }
}

impl Default for RuntimeStatus {
    fn default() -> Self {
        Self::new()
    }
}
