//! Live controller state shared with other processes through a file.
//!
//! The daemon writes `<config stem>.status.json` next to the config file
//! whenever the phase or speed changes, and at least every
//! [`REFRESH_MS`] otherwise, so the timestamp doubles as a heartbeat.
//! Readers (the `status` subcommand) treat a record older than
//! [`STALE_AFTER_MS`] as "no controller running".  The file is removed on
//! clean shutdown.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::status::RuntimeSnapshot;

use super::json_file::write_atomic;

/// Heartbeat period while nothing changes.
pub const REFRESH_MS: u64 = 1000;
/// A record older than this no longer describes a live controller.
pub const STALE_AFTER_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct StatusRecord {
    #[serde(flatten)]
    runtime: RuntimeSnapshot,
    updated_unix_ms: u64,
}

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

pub struct StatusFile {
    path: PathBuf,
    last_written: Option<(RuntimeSnapshot, u64)>,
}

impl StatusFile {
    /// Status file for the config at `config_path`: `config.json` maps to
    /// `config.status.json`.
    pub fn beside(config_path: &Path) -> Self {
        Self {
            path: config_path.with_extension("status.json"),
            last_written: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `runtime` if it changed or the heartbeat is due.  Returns
    /// `true` when the file was written.
    pub fn publish(&mut self, runtime: RuntimeSnapshot, now_unix_ms: u64) -> std::io::Result<bool> {
        let due = match self.last_written {
            Some((last, at)) => last != runtime || now_unix_ms.saturating_sub(at) >= REFRESH_MS,
            None => true,
        };
        if !due {
            return Ok(false);
        }
        let record = StatusRecord {
            runtime,
            updated_unix_ms: now_unix_ms,
        };
        let bytes = serde_json::to_vec(&record).map_err(std::io::Error::other)?;
        write_atomic(&self.path, &bytes)?;
        self.last_written = Some((runtime, now_unix_ms));
        Ok(true)
    }

    /// Last state published by a live controller, if any.
    pub fn read(&self, now_unix_ms: u64) -> Option<RuntimeSnapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Status: cannot read {}: {}", self.path.display(), e);
                return None;
            }
        };
        let record: StatusRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("Status: ignoring malformed {}: {}", self.path.display(), e);
                return None;
            }
        };
        let age = now_unix_ms.saturating_sub(record.updated_unix_ms);
        if age > STALE_AFTER_MS {
            debug!("Status: record is {} ms old, controller not running", age);
            return None;
        }
        Some(record.runtime)
    }

    /// Drop the record so readers stop reporting a live controller.
    pub fn remove(&mut self) {
        self.last_written = None;
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Status: cannot remove {}: {}", self.path.display(), e);
            }
        }
    }
}
