//! In-memory PWM for running without hardware (`--simulate`).
//!
//! The duty cycle lives in a shared cell so the caller can observe what
//! the controller committed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use core::convert::Infallible;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use log::info;

use crate::app::ports::OutputFactory;
use crate::drivers::pump::PumpDriver;
use crate::error::Result;
use crate::pins::PWM_RESOLUTION_BITS;

#[derive(Clone, Default)]
pub struct SimPwm {
    duty: Arc<AtomicU16>,
}

impl SimPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed)
    }
}

impl ErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        ((1u32 << PWM_RESOLUTION_BITS) - 1) as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Infallible> {
        self.duty.store(duty, Ordering::Relaxed);
        Ok(())
    }
}

/// Opens a [`SimPwm`]-backed driver on any pin.
#[derive(Default)]
pub struct SimOutputFactory {
    last: Option<SimPwm>,
}

impl SimOutputFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel handed out by the most recent `open`.
    pub fn last_opened(&self) -> Option<&SimPwm> {
        self.last.as_ref()
    }
}

impl OutputFactory for SimOutputFactory {
    type Output = PumpDriver<SimPwm>;

    fn open(&mut self, pin: u8) -> Result<Self::Output> {
        info!("Simulated PWM on pin {}", pin);
        let pwm = SimPwm::new();
        self.last = Some(pwm.clone());
        Ok(PumpDriver::new(pwm))
    }
}
