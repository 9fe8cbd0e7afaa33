//! NVS (Non-Volatile Storage) config adapter.
//!
//! Implements [`ConfigPort`] on ESP32 by storing the config as one JSON
//! blob, the same document the host keeps in `config.json`.  Loading
//! merges the blob over defaults field by field, so firmware updates that
//! add fields keep the user's stored values.
//!
//! On non-ESP targets an in-memory blob stands in for flash.
//!
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use log::{debug, info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::PumpConfig;

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"watershed\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"pumpcfg\0";

const MAX_BLOB_SIZE: usize = 4000;

/// What a `load()` found in flash.  Only a change of outcome is logged at
/// info/warn level; the config check polls once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Missing,
    Loaded { bytes: usize, window_ok: bool },
    NotObject,
    NotJson,
}

pub struct NvsConfig {
    #[cfg(not(target_os = "espidf"))]
    blob: std::sync::Mutex<Option<Vec<u8>>>,
    last_outcome: std::sync::Mutex<Option<LoadOutcome>>,
}

impl NvsConfig {
    /// Initialise NVS flash.  On first boot or after a version mismatch
    /// the partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(ConfigError::Io(std::io::ErrorKind::Other));
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::Io(std::io::ErrorKind::Other));
            }
            info!("NvsConfig: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfig: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::sync::Mutex::new(None),
            last_outcome: std::sync::Mutex::new(None),
        })
    }

    /// Log `outcome` if it differs from the previous load.  Returns `true`
    /// when it was reported.
    fn report(&self, outcome: LoadOutcome) -> bool {
        let mut last = self
            .last_outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last == Some(outcome) {
            debug!("NvsConfig: {:?} (unchanged)", outcome);
            return false;
        }
        *last = Some(outcome);
        match outcome {
            LoadOutcome::Missing => info!("NvsConfig: no stored config, using defaults"),
            LoadOutcome::Loaded { bytes, window_ok } => {
                info!("NvsConfig: loaded config ({} bytes)", bytes);
                if !window_ok {
                    warn!("NvsConfig: schedule window is malformed, schedule stays inactive");
                }
            }
            LoadOutcome::NotObject => {
                warn!("NvsConfig: stored config is not an object, using defaults")
            }
            LoadOutcome::NotJson => warn!("NvsConfig: stored config is not JSON, using defaults"),
        }
        true
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    /// Raw blob, `None` if nothing is stored yet.
    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => {
                warn!("NvsConfig: NVS read error {}", e);
                Err(ConfigError::Io(std::io::ErrorKind::Other))
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self
            .blob
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsConfig: NVS write error {}", e);
            ConfigError::Io(std::io::ErrorKind::Other)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        *self
            .blob
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(bytes.to_vec());
        Ok(())
    }
}

impl ConfigPort for NvsConfig {
    fn load(&self) -> Result<PumpConfig, ConfigError> {
        let defaults = PumpConfig::default();
        let Some(bytes) = self.read_blob()? else {
            self.report(LoadOutcome::Missing);
            return Ok(defaults);
        };
        let merged = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => PumpConfig::merge_json(&defaults, &value).ok_or(LoadOutcome::NotObject),
            Err(_) => Err(LoadOutcome::NotJson),
        };
        let config = match merged {
            Ok(config) => config.sanitized(),
            Err(outcome) => {
                self.report(outcome);
                return Ok(defaults);
            }
        };
        self.report(LoadOutcome::Loaded {
            bytes: bytes.len(),
            window_ok: config.schedule_window().is_some(),
        });
        Ok(config)
    }

    fn save(&self, config: &PumpConfig) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec(config)
            .map_err(|_| ConfigError::ValidationFailed("config is not serialisable"))?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config exceeds NVS blob size"));
        }
        self.write_blob(&bytes)?;
        info!("NvsConfig: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
