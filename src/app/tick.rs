//! Control-tick handler for the timer-driven runtime.
//!
//! One [`Event::ControlTick`](crate::events::Event::ControlTick) maps to
//! one [`TickDriver::on_tick`] call:
//!
//! ```text
//!   feed liveness ──▶ PumpService::tick ──▶ publish RuntimeStatus
//! ```
//!
//! Liveness is fed first and unconditionally, so the watchdog only fires
//! if ticks stop arriving, not because a single output write failed.

use std::sync::Arc;

use log::warn;

use crate::config::PumpConfig;

use super::events::AppEvent;
use super::ports::{EventSink, LivenessPort, LocalTime, PumpOutput};
use super::service::PumpService;
use super::status::RuntimeStatus;

pub struct TickDriver<L: LivenessPort> {
    liveness: L,
    service: PumpService,
    status: Arc<RuntimeStatus>,
}

impl<L: LivenessPort> TickDriver<L> {
    pub fn new(liveness: L, service: PumpService, status: Arc<RuntimeStatus>) -> Self {
        Self {
            liveness,
            service,
            status,
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.service.start(sink);
        self.status
            .publish(self.service.phase(), self.service.current_speed());
    }

    /// Handle one control tick.  Never blocks and never fails.
    pub fn on_tick(
        &mut self,
        config: Arc<PumpConfig>,
        now_ms: u64,
        wall: Option<LocalTime>,
        out: &mut impl PumpOutput,
        sink: &mut impl EventSink,
    ) {
        self.liveness.feed();

        if let Err(e) = self.service.tick(config, now_ms, wall, out, sink) {
            warn!("Control tick: {}", e);
            sink.emit(&AppEvent::OutputFault(e));
        }

        self.status.publish(self.service.phase(), out.speed());
    }

    /// Account for a tick that could not run because no output is open.
    /// Liveness is still fed: the loop itself is healthy.
    pub fn skip_tick(&mut self) {
        self.liveness.feed();
    }

    /// A fresh output was opened; rewrite the current speed to it.
    pub fn output_replaced(&mut self) {
        self.service.output_replaced();
    }

    pub fn service(&self) -> &PumpService {
        &self.service
    }

    pub fn liveness(&self) -> &L {
        &self.liveness
    }
}
