//! Pump motor driver (PWM enable + optional H-bridge direction pins).
//!
//! Generic over any `embedded_hal` PWM channel, so the same driver runs
//! on ESP-IDF LEDC, Linux sysfs PWM, or a test double.
//!
//! ```text
//!   speed > 0 :  IN1 high, IN2 low, duty = round(speed * max_duty)
//!   speed = 0 :  duty 0, IN1 low, IN2 low   (coast)
//! ```

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::PumpOutput;
use crate::control::clamp_speed;
use crate::error::{OutputError, Result};

/// Direction pins of an H-bridge.  `()` means the driver has none.
pub trait Bridge {
    fn forward(&mut self) -> core::result::Result<(), OutputError>;
    fn coast(&mut self) -> core::result::Result<(), OutputError>;
}

impl Bridge for () {
    fn forward(&mut self) -> core::result::Result<(), OutputError> {
        Ok(())
    }

    fn coast(&mut self) -> core::result::Result<(), OutputError> {
        Ok(())
    }
}

/// `(IN1, IN2)` pair.
impl<A: OutputPin, B: OutputPin> Bridge for (A, B) {
    fn forward(&mut self) -> core::result::Result<(), OutputError> {
        self.0.set_high().map_err(|_| OutputError::GpioWriteFailed)?;
        self.1.set_low().map_err(|_| OutputError::GpioWriteFailed)
    }

    fn coast(&mut self) -> core::result::Result<(), OutputError> {
        self.0.set_low().map_err(|_| OutputError::GpioWriteFailed)?;
        self.1.set_low().map_err(|_| OutputError::GpioWriteFailed)
    }
}

pub struct PumpDriver<P: SetDutyCycle, B: Bridge = ()> {
    pwm: P,
    bridge: B,
    speed: f32,
}

impl<P: SetDutyCycle> PumpDriver<P, ()> {
    /// Driver for a bare PWM output (MOSFET or pre-wired driver).
    pub fn new(pwm: P) -> Self {
        Self::with_bridge(pwm, ())
    }
}

impl<P: SetDutyCycle, B: Bridge> PumpDriver<P, B> {
    pub fn with_bridge(pwm: P, bridge: B) -> Self {
        Self {
            pwm,
            bridge,
            speed: 0.0,
        }
    }

    /// Duty value written for `speed` (already clamped).
    fn duty_for(&self, speed: f32) -> u16 {
        let max = self.pwm.max_duty_cycle();
        ((speed * max as f32).round() as u32).min(max as u32) as u16
    }

    fn write_duty(&mut self, duty: u16) -> core::result::Result<(), OutputError> {
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|_| OutputError::PwmWriteFailed)
    }

    pub fn into_parts(self) -> (P, B) {
        (self.pwm, self.bridge)
    }
}

impl<P: SetDutyCycle, B: Bridge> PumpOutput for PumpDriver<P, B> {
    fn set_speed(&mut self, speed: f32) -> Result<()> {
        let speed = clamp_speed(speed);
        if speed > 0.0 {
            self.bridge.forward()?;
            let duty = self.duty_for(speed);
            self.write_duty(duty)?;
        } else {
            self.write_duty(0)?;
            self.bridge.coast()?;
        }
        self.speed = speed;
        Ok(())
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn close(&mut self) {
        if let Err(e) = self.set_speed(0.0) {
            warn!("Pump driver: stop on close failed: {}", e);
        }
    }
}
