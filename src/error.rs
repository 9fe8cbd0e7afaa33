//! Unified error types for the Watershed controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! supervised control loop's error handling uniform.  All variants are
//! `Copy` so they can be passed through the loop and logged without
//! allocation.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pump output could not be claimed (bad pin, missing PWM chip).
    HardwareInit(OutputError),
    /// A speed command to an already-open output failed.
    Output(OutputError),
    /// Configuration could not be loaded or persisted.
    Config(ConfigError),
}

impl Error {
    /// Hardware-init failures get the long backoff in the supervised loop;
    /// everything else is treated as transient.
    pub fn is_hardware_init(&self) -> bool {
        matches!(self, Self::HardwareInit(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareInit(e) => write!(f, "hardware init: {e}"),
            Self::Output(e) => write!(f, "output: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    /// The requested pin has no PWM channel on this board.
    InvalidPin(u8),
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// H-bridge direction pin write failed.
    GpioWriteFailed,
    /// Filesystem-backed output (sysfs) returned an I/O error.
    Io(std::io::ErrorKind),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "no PWM channel on pin {pin}"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
        }
    }
}

impl From<std::io::Error> for OutputError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl From<OutputError> for Error {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
