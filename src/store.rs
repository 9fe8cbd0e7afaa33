//! Shared configuration snapshot.
//!
//! Readers get an `Arc<PumpConfig>`; the pointed-to value is never
//! mutated, so a reader holding an old snapshot keeps a consistent view
//! while a writer publishes a new one.  The lock is held only long enough
//! to clone or swap the `Arc`, never across I/O.

use std::sync::{Arc, PoisonError, RwLock};

use crate::config::PumpConfig;

pub struct ConfigStore {
    current: RwLock<Arc<PumpConfig>>,
}

impl ConfigStore {
    pub fn new(initial: PumpConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Current snapshot.
    pub fn read(&self) -> Arc<PumpConfig> {
        // The guarded value is a whole `Arc`, so a poisoned lock still
        // holds a complete snapshot.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the snapshot.  Concurrent publishers serialise on the lock;
    /// last writer wins.  No validation happens here.
    pub fn publish(&self, config: PumpConfig) {
        let next = Arc::new(config);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Derive and publish a new snapshot from the current one while holding
    /// the write lock, so two concurrent read-modify-publish sequences
    /// cannot lose each other's changes.  Returns the published snapshot.
    pub fn modify(&self, f: impl FnOnce(&PumpConfig) -> PumpConfig) -> Arc<PumpConfig> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(f(&guard));
        *guard = Arc::clone(&next);
        next
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(PumpConfig::default())
    }
}
