//! Linux sysfs PWM output.
//!
//! ```text
//!   <chip>/export              ← channel number
//!   <chip>/pwm<N>/period       ← SYSFS_PWM_PERIOD_NS
//!   <chip>/pwm<N>/duty_cycle   ← period * duty / max_duty
//!   <chip>/pwm<N>/enable       ← 1 on open, 0 on drop
//! ```
//!
//! [`SysfsPwm`] is an `embedded_hal` PWM channel, so it plugs into the
//! same [`PumpDriver`] as the LEDC channel on ESP32.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use log::{debug, info, warn};

use crate::app::ports::OutputFactory;
use crate::drivers::pump::PumpDriver;
use crate::error::{Error, OutputError, Result};
use crate::pins::{sysfs_pwm_channel, PWM_RESOLUTION_BITS, SYSFS_PWM_PERIOD_NS};

/// Default PWM chip on a Raspberry Pi.
pub const DEFAULT_PWM_CHIP: &str = "/sys/class/pwm/pwmchip0";

/// Polls for the channel directory after export; udev creates it lazily.
const EXPORT_POLLS: u32 = 20;
const EXPORT_POLL_MS: u64 = 10;

/// I/O failure on a sysfs attribute.
#[derive(Debug)]
pub struct SysfsPwmError(pub io::Error);

impl embedded_hal::pwm::Error for SysfsPwmError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

/// One exported sysfs PWM channel.
pub struct SysfsPwm {
    dir: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    /// Export `channel` on `chip` (if needed), program the period and
    /// enable it with zero duty.
    pub fn open(chip: &Path, channel: u8) -> io::Result<Self> {
        let dir = chip.join(format!("pwm{channel}"));
        if !dir.exists() {
            fs::write(chip.join("export"), channel.to_string())?;
            let mut polls = 0;
            while !dir.exists() {
                if polls == EXPORT_POLLS {
                    return Err(io::Error::new(
                        ErrorKind::NotFound,
                        format!("{} did not appear after export", dir.display()),
                    ));
                }
                polls += 1;
                std::thread::sleep(std::time::Duration::from_millis(EXPORT_POLL_MS));
            }
        }

        let pwm = Self {
            dir,
            period_ns: SYSFS_PWM_PERIOD_NS,
        };
        // duty must never exceed period, so zero it before changing period.
        pwm.write_attr("duty_cycle", 0)?;
        pwm.write_attr("period", pwm.period_ns)?;
        pwm.write_attr("enable", 1)?;
        debug!("sysfs PWM: {} enabled", pwm.dir.display());
        Ok(pwm)
    }

    fn write_attr(&self, name: &str, value: u64) -> io::Result<()> {
        fs::write(self.dir.join(name), value.to_string())
    }
}

impl ErrorType for SysfsPwm {
    type Error = SysfsPwmError;
}

impl SetDutyCycle for SysfsPwm {
    fn max_duty_cycle(&self) -> u16 {
        ((1u32 << PWM_RESOLUTION_BITS) - 1) as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), SysfsPwmError> {
        let max = self.max_duty_cycle().max(1) as u64;
        let ns = self.period_ns * (duty as u64).min(max) / max;
        self.write_attr("duty_cycle", ns).map_err(SysfsPwmError)
    }
}

impl Drop for SysfsPwm {
    fn drop(&mut self) {
        if let Err(e) = self.write_attr("enable", 0) {
            warn!("sysfs PWM: disable {} failed: {}", self.dir.display(), e);
        }
    }
}

/// Opens [`PumpDriver`]s on sysfs PWM channels.
pub struct SysfsPwmFactory {
    chip: PathBuf,
}

impl Default for SysfsPwmFactory {
    fn default() -> Self {
        Self::new(DEFAULT_PWM_CHIP)
    }
}

impl SysfsPwmFactory {
    pub fn new(chip: impl Into<PathBuf>) -> Self {
        Self { chip: chip.into() }
    }
}

impl OutputFactory for SysfsPwmFactory {
    type Output = PumpDriver<SysfsPwm>;

    fn open(&mut self, pin: u8) -> Result<Self::Output> {
        let channel =
            sysfs_pwm_channel(pin).ok_or(Error::HardwareInit(OutputError::InvalidPin(pin)))?;
        let pwm = SysfsPwm::open(&self.chip, channel)
            .map_err(|e| Error::HardwareInit(OutputError::from(e)))?;
        info!("sysfs PWM: pin {} on channel {}", pin, channel);
        Ok(PumpDriver::new(pwm))
    }
}
