//! Outbound application events.
//!
//! The pump controllers emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to console, publish, etc.).

use crate::error::Error;
use crate::fsm::Phase;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The controller has started (carries initial phase).
    Started(Phase),

    /// The controller moved between phases.
    PhaseChanged { from: Phase, to: Phase },

    /// A new speed was written to the output.
    SpeedCommitted(f32),

    /// A pump output was opened on `pin`.
    OutputOpened { pin: u8 },

    /// Writing to or opening the output failed.
    OutputFault(Error),

    /// A new configuration snapshot was loaded and published.
    ConfigReloaded,
}
