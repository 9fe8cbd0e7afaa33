//! Fuzz target: `PumpConfig::merge_json`
//!
//! Feeds arbitrary bytes through the same path a config file or NVS blob
//! takes on load and asserts that the merged config is always usable:
//! timing floors applied, speeds finite and in range.
//!
//! cargo fuzz run fuzz_config_merge

#![no_main]

use libfuzzer_sys::fuzz_target;
use watershed::config::{MIN_INTERVAL_MS, MIN_ON_DURATION_MS, PumpConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let defaults = PumpConfig::default();
    let Some(merged) = PumpConfig::merge_json(&defaults, &value) else {
        return;
    };
    let c = merged.sanitized();

    assert!(c.interval_ms >= MIN_INTERVAL_MS);
    assert!(c.on_duration_ms >= MIN_ON_DURATION_MS);
    assert!((0.0..=1.0).contains(&c.pump_speed_min));
    assert!((0.0..=1.0).contains(&c.pump_speed_max));

    // A sanitized config survives its own serialisation.
    let json = serde_json::to_value(&c).expect("config serialises");
    let again = PumpConfig::merge_json(&defaults, &json).expect("own output merges");
    assert_eq!(again.sanitized(), c);
});
