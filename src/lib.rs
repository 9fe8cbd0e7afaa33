//! Watershed pump controller library.
//!
//! Exposes the pure-logic modules for integration testing and for the
//! binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod fsm;
pub mod pins;
pub mod schedule;
pub mod store;

pub mod adapters;
pub mod drivers;
