//! Fuzz target: `apply_form`
//!
//! Splits the input into `KEY=VALUE` lines, parses them the way the CLI
//! does, and applies them to the default config. Garbage values must be
//! dropped, never panic, and never produce an out-of-range config.
//!
//! cargo fuzz run fuzz_form_update

#![no_main]

use libfuzzer_sys::fuzz_target;
use watershed::app::commands::FormUpdate;
use watershed::app::settings::apply_form;
use watershed::config::{MIN_INTERVAL_MS, PumpConfig, TimeOfDay};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let base = PumpConfig::default();
    let mut form = FormUpdate::new();
    for line in text.lines() {
        let _ = form.push_assignment(line);
    }
    form.complete_schedule_group(&base);

    let c = apply_form(&base, &form);
    assert!(c.interval_ms >= MIN_INTERVAL_MS);
    assert!((0.0..=1.0).contains(&c.pump_speed_max));
    // Only well-formed times are ever stored.
    assert!(TimeOfDay::parse_hhmm(&c.start_time).is_some());
    assert!(TimeOfDay::parse_hhmm(&c.end_time).is_some());
});
