//! Pump peripheral initialisation for ESP32.
//!
//! Configures one LEDC timer/channel for the pump enable line and two
//! GPIO outputs for the H-bridge direction inputs, using raw ESP-IDF sys
//! calls.  [`LedcOutputFactory`] does this on every `open`, so a changed
//! `pump_pin` re-routes the LEDC channel without a reboot.
//!
//! On non-ESP targets the registers are simulated in memory.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType as DigitalErrorType, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use log::info;

use crate::app::ports::OutputFactory;
use crate::drivers::pump::PumpDriver;
use crate::error::{Error, OutputError, Result};
use crate::pins;

/// LEDC channel dedicated to the pump.
pub const LEDC_CH_PUMP: u32 = 0;

/// Highest GPIO number on the ESP32-S3.
const MAX_GPIO: u8 = 48;

// ── LEDC PWM ─────────────────────────────────────────────────

/// The pump's LEDC channel.
pub struct LedcChannel {
    channel: u32,
    #[cfg(not(target_os = "espidf"))]
    duty: u16,
}

impl LedcChannel {
    /// Configure the pump timer and route `channel` to `gpio`.
    #[cfg(target_os = "espidf")]
    fn configure(channel: u32, gpio: i32) -> core::result::Result<Self, OutputError> {
        // SAFETY: called from the single task that owns the pump output.
        unsafe {
            let timer = ledc_timer_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                timer_num: ledc_timer_t_LEDC_TIMER_0,
                duty_resolution: pins::PWM_RESOLUTION_BITS,
                freq_hz: pins::PUMP_PWM_FREQ_HZ,
                clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
                ..Default::default()
            };
            let ret = ledc_timer_config(&timer);
            if ret != ESP_OK {
                log::error!("hw_init: LEDC timer config failed (rc={})", ret);
                return Err(OutputError::PwmWriteFailed);
            }
            let ret = ledc_channel_config(&ledc_channel_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel,
                timer_sel: ledc_timer_t_LEDC_TIMER_0,
                gpio_num: gpio,
                duty: 0,
                hpoint: 0,
                ..Default::default()
            });
            if ret != ESP_OK {
                log::error!("hw_init: LEDC channel config failed (rc={})", ret);
                return Err(OutputError::PwmWriteFailed);
            }
        }
        info!("hw_init: LEDC CH{} on GPIO{}", channel, gpio);
        Ok(Self { channel })
    }

    #[cfg(not(target_os = "espidf"))]
    fn configure(channel: u32, gpio: i32) -> core::result::Result<Self, OutputError> {
        info!("hw_init(sim): LEDC CH{} on GPIO{}", channel, gpio);
        Ok(Self { channel, duty: 0 })
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Last duty written (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn duty(&self) -> u16 {
        self.duty
    }
}

impl PwmErrorType for LedcChannel {
    type Error = Infallible;
}

impl SetDutyCycle for LedcChannel {
    fn max_duty_cycle(&self) -> u16 {
        ((1u32 << pins::PWM_RESOLUTION_BITS) - 1) as u16
    }

    #[cfg(target_os = "espidf")]
    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Infallible> {
        // SAFETY: the channel was configured in `configure`; only the
        // owning task writes its duty register.
        unsafe {
            ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel, duty as u32);
            ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Infallible> {
        self.duty = duty;
        Ok(())
    }
}

// ── GPIO outputs ──────────────────────────────────────────────

/// Push-pull GPIO output (H-bridge IN1 / IN2).
pub struct GpioOut {
    pin: i32,
    #[cfg(not(target_os = "espidf"))]
    high: bool,
}

impl GpioOut {
    #[cfg(target_os = "espidf")]
    fn configure(pin: i32) -> core::result::Result<Self, OutputError> {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: one-time pin setup from the owning task.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            log::error!("hw_init: GPIO{} config failed (rc={})", pin, ret);
            return Err(OutputError::GpioWriteFailed);
        }
        unsafe { gpio_set_level(pin, 0) };
        Ok(Self { pin })
    }

    #[cfg(not(target_os = "espidf"))]
    fn configure(pin: i32) -> core::result::Result<Self, OutputError> {
        Ok(Self { pin, high: false })
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    /// Current level (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn is_high(&self) -> bool {
        self.high
    }

    fn write(&mut self, high: bool) {
        #[cfg(target_os = "espidf")]
        // SAFETY: pin configured as output in `configure`.
        unsafe {
            gpio_set_level(self.pin, u32::from(high));
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.high = high;
        }
    }
}

impl DigitalErrorType for GpioOut {
    type Error = Infallible;
}

impl OutputPin for GpioOut {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        self.write(true);
        Ok(())
    }
}

// ── Factory ───────────────────────────────────────────────────

/// Pump driver on the board's LEDC channel plus H-bridge pins.
pub type BoardPump = PumpDriver<LedcChannel, (GpioOut, GpioOut)>;

/// Opens [`BoardPump`]s, routing the PWM to the configured pin.
#[derive(Default)]
pub struct LedcOutputFactory;

impl LedcOutputFactory {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFactory for LedcOutputFactory {
    type Output = BoardPump;

    fn open(&mut self, pin: u8) -> Result<Self::Output> {
        if pin > MAX_GPIO
            || i32::from(pin) == pins::PUMP_IN1_GPIO
            || i32::from(pin) == pins::PUMP_IN2_GPIO
        {
            return Err(Error::HardwareInit(OutputError::InvalidPin(pin)));
        }
        let pwm = LedcChannel::configure(LEDC_CH_PUMP, i32::from(pin)).map_err(Error::HardwareInit)?;
        let in1 = GpioOut::configure(pins::PUMP_IN1_GPIO).map_err(Error::HardwareInit)?;
        let in2 = GpioOut::configure(pins::PUMP_IN2_GPIO).map_err(Error::HardwareInit)?;
        Ok(PumpDriver::with_bridge(pwm, (in1, in2)))
    }
}
