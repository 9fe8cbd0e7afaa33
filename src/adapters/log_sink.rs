//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on ESP32, stderr on the host).  Speed
//! commits are frequent during fades, so they go out at debug level.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(phase) => {
                info!("START | initial_phase={}", phase);
            }
            AppEvent::PhaseChanged { from, to } => {
                info!("PHASE | {} -> {}", from, to);
            }
            AppEvent::SpeedCommitted(speed) => {
                debug!("SPEED | {:.3}", speed);
            }
            AppEvent::OutputOpened { pin } => {
                info!("OUTPUT | opened pin {}", pin);
            }
            AppEvent::OutputFault(e) => {
                warn!("FAULT | {}", e);
            }
            AppEvent::ConfigReloaded => {
                info!("CONFIG | reloaded");
            }
        }
    }
}
