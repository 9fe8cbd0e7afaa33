//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] over a single JSON file.
//!
//! - **Load** merges the file over defaults field by field; a missing or
//!   unparsable file yields defaults.  If the merged result differs from
//!   what is on disk (missing fields, repaired values) it is written back
//!   so the file always holds a complete config.
//! - **Save** writes `<file>.tmp`, fsyncs it, then renames it over the
//!   original, so readers see either the old or the new file, never a
//!   partial one.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::PumpConfig;

pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the config file, if it exists.
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    /// Parse the file into a JSON value.  `Ok(None)` means "use defaults".
    fn read_value(&self) -> Result<Option<serde_json::Value>, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Config: {} not found, using defaults", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) if value.is_object() => Ok(Some(value)),
            Ok(_) | Err(_) => {
                warn!(
                    "Config: {} is not a JSON object, using defaults",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }
}

/// Replace `path` with `bytes` via `<path>.tmp`, fsync and rename, so
/// readers see either the old or the new content, never a partial one.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    let tmp = PathBuf::from(name);
    let result = (|| {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.flush()?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// `true` unless the file already holds exactly `config`: same key set
/// and values that parse back to the same config.
fn needs_write_back(on_disk: Option<&serde_json::Value>, config: &PumpConfig) -> bool {
    let Some(obj) = on_disk.and_then(serde_json::Value::as_object) else {
        return true;
    };
    let Ok(complete) = serde_json::to_value(config) else {
        return false;
    };
    let same_keys = complete
        .as_object()
        .is_some_and(|c| c.len() == obj.len() && c.keys().all(|k| obj.contains_key(k)));
    let same_values = serde_json::from_value::<PumpConfig>(serde_json::Value::Object(obj.clone()))
        .is_ok_and(|parsed| &parsed == config);
    !(same_keys && same_values)
}

impl ConfigPort for JsonFileConfig {
    fn load(&self) -> Result<PumpConfig, ConfigError> {
        let on_disk = self.read_value()?;
        let defaults = PumpConfig::default();

        let config = match &on_disk {
            Some(value) => PumpConfig::merge_json(&defaults, value).ok_or(ConfigError::Corrupted)?,
            None => defaults,
        }
        .sanitized();
        if config.schedule_window().is_none() {
            warn!(
                "Config: schedule window '{}'..'{}' is malformed, schedule stays inactive",
                config.start_time, config.end_time
            );
        }

        if needs_write_back(on_disk.as_ref(), &config) {
            if let Err(e) = self.save(&config) {
                warn!("Config: could not write back merged config: {}", e);
            }
        }
        Ok(config)
    }

    fn save(&self, config: &PumpConfig) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec_pretty(config)
            .map_err(|_| ConfigError::ValidationFailed("config is not serialisable"))?;
        write_atomic(&self.path, &bytes)?;
        info!("Config: saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static NEXT: AtomicU32 = AtomicU32::new(0);

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "watershed-json-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn missing_file_loads_defaults_and_creates_it() {
        let path = scratch("config.json");
        let port = JsonFileConfig::new(&path);
        let cfg = port.load().unwrap();
        assert_eq!(cfg, PumpConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_is_completed_on_disk() {
        let path = scratch("config.json");
        fs::write(&path, r#"{"interval_ms": 9000, "bogus": 1}"#).unwrap();
        let port = JsonFileConfig::new(&path);
        let cfg = port.load().unwrap();
        assert_eq!(cfg.interval_ms, 9000);

        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["interval_ms"], 9000);
        assert_eq!(on_disk["end_time"], "23:59");
        assert!(on_disk.get("bogus").is_none());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = scratch("config.json");
        fs::write(&path, "{ not json").unwrap();
        let cfg = JsonFileConfig::new(&path).load().unwrap();
        assert_eq!(cfg, PumpConfig::default());
    }

    #[test]
    fn bad_field_keeps_default() {
        let path = scratch("config.json");
        fs::write(&path, r#"{"on_duration_ms": "long", "fade_time_ms": 300}"#).unwrap();
        let cfg = JsonFileConfig::new(&path).load().unwrap();
        assert_eq!(cfg.on_duration_ms, PumpConfig::default().on_duration_ms);
        assert_eq!(cfg.fade_time_ms, 300);
    }

    #[test]
    fn save_then_load_roundtrip_leaves_no_tmp() {
        let path = scratch("config.json");
        let port = JsonFileConfig::new(&path);
        let cfg = PumpConfig {
            manual_on: true,
            start_time: "21:30".into(),
            ..PumpConfig::default()
        };
        port.save(&cfg).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(port.load().unwrap(), cfg);
    }

    #[test]
    fn complete_file_is_not_rewritten() {
        let path = scratch("config.json");
        let port = JsonFileConfig::new(&path);
        port.save(&PumpConfig::default()).unwrap();
        let before = fs::read_to_string(&path).unwrap();
        fs::write(&path, &before).unwrap();
        let stamp = port.modified();
        port.load().unwrap();
        assert_eq!(port.modified(), stamp);
    }
}
