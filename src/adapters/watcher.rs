//! Config file hot reload.
//!
//! Polls the file's modification time.  A change is reloaded through the
//! [`ConfigPort`] and published to the [`ConfigStore`], at most once per
//! [`RELOAD_DEBOUNCE_MS`].  A change seen inside the debounce window is
//! not lost: the stored mtime is left alone, so the next poll after the
//! window picks it up.

use std::time::SystemTime;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ConfigPort, EventSink};
use crate::store::ConfigStore;

use super::json_file::JsonFileConfig;

/// Minimum spacing between two reloads.
pub const RELOAD_DEBOUNCE_MS: u64 = 1000;

pub struct ConfigWatcher {
    last_seen: Option<SystemTime>,
    last_reload_ms: Option<u64>,
}

impl ConfigWatcher {
    /// Start watching; the file's current state counts as already loaded.
    pub fn new(file: &JsonFileConfig) -> Self {
        Self {
            last_seen: file.modified(),
            last_reload_ms: None,
        }
    }

    /// Check for a change and reload if one is due.  Returns `true` when a
    /// new snapshot was published.
    pub fn poll(
        &mut self,
        now_ms: u64,
        file: &JsonFileConfig,
        store: &ConfigStore,
        sink: &mut impl EventSink,
    ) -> bool {
        let stamp = file.modified();
        if stamp == self.last_seen || stamp.is_none() {
            return false;
        }
        if self
            .last_reload_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < RELOAD_DEBOUNCE_MS)
        {
            return false;
        }

        self.last_reload_ms = Some(now_ms);
        match file.load() {
            Ok(config) => {
                // Loading may write the file back; don't treat that as a
                // fresh external edit.
                self.last_seen = file.modified();
                store.publish(config);
                info!("Config: reloaded {}", file.path().display());
                sink.emit(&AppEvent::ConfigReloaded);
                true
            }
            Err(e) => {
                self.last_seen = stamp;
                warn!("Config: reload of {} failed: {}", file.path().display(), e);
                false
            }
        }
    }
}
