//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the Watershed pump:
//! the two controller runtimes (blocking worker and timer tick), the
//! settings operations, and live status.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod blocking;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod settings;
pub mod status;
pub mod tick;
