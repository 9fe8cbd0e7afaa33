//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PumpService / BlockingController (domain)
//! ```
//!
//! Driven adapters (PWM outputs, clocks, event sinks, config files, the
//! hardware watchdog) implement these traits.  The controllers consume
//! them via generics, so the domain core never touches hardware directly.

use crate::config::{PumpConfig, TimeOfDay, Weekday};
use crate::error::Result;

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → motor driver)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain commands pump speed through this.
pub trait PumpOutput {
    /// Command a speed.  Implementations clamp to `[0.0, 1.0]`.
    fn set_speed(&mut self, speed: f32) -> Result<()>;

    /// Last speed successfully committed.
    fn speed(&self) -> f32;

    /// Stop the pump and release the underlying hardware.
    fn close(&mut self);
}

/// Opens a [`PumpOutput`] for a physical pin.
///
/// Failures surface as [`Error::HardwareInit`](crate::error::Error::HardwareInit)
/// so the supervised loop applies the long backoff.
pub trait OutputFactory {
    type Output: PumpOutput;

    fn open(&mut self, pin: u8) -> Result<Self::Output>;
}

// ───────────────────────────────────────────────────────────────
// Time ports
// ───────────────────────────────────────────────────────────────

/// Monotonic time source plus the ability to block the caller.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.  Never goes backwards.
    fn now_ms(&self) -> u64;

    /// Block the calling thread.
    fn sleep_ms(&self, ms: u64);
}

/// Local wall-clock reading used by the schedule evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub weekday: Weekday,
    pub time: TimeOfDay,
}

/// Wall-clock source.  `None` means the clock is not trustworthy yet
/// (e.g. SNTP has not synced); the schedule then evaluates inactive.
pub trait WallClock {
    fn local_now(&self) -> Option<LocalTime>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists pump configuration.
pub trait ConfigPort {
    /// Load configuration, filling absent fields from defaults.
    /// Returns [`PumpConfig::default()`] if nothing is stored yet.
    fn load(&self) -> core::result::Result<PumpConfig, ConfigError>;

    /// Persist configuration atomically.
    fn save(&self, config: &PumpConfig) -> core::result::Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Liveness port (domain → hardware watchdog)
// ───────────────────────────────────────────────────────────────

/// Proof-of-life signal.  Fed from exactly one place: the control tick.
pub trait LivenessPort {
    fn feed(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config is not a JSON object.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// I/O error from the storage backend.
    Io(std::io::ErrorKind),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Io(kind) => write!(f, "I/O error ({})", kind),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            kind => Self::Io(kind),
        }
    }
}
