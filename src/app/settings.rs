//! Settings operations shared by every control surface.
//!
//! [`SettingsService`] turns [`AppCommand`]s into new config snapshots:
//! derive from the current snapshot, validate, persist, then publish.
//! A snapshot that fails to persist is never published.

use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};
use serde::Serialize;

use crate::config::{PumpConfig, TimeOfDay, Weekday, WeekdaySet};
use crate::error::Result;
use crate::fsm::Phase;
use crate::schedule::is_schedule_active;
use crate::store::ConfigStore;

use super::commands::{AppCommand, FormUpdate};
use super::ports::{ConfigPort, LocalTime};
use super::status::RuntimeSnapshot;

/// Fields whose presence marks a submission of the schedule form.
const SCHEDULE_FORM_KEYS: [&str; 3] = ["start_time", "end_time", "enabled"];

/// Point-in-time view of the controller for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Schedule, manual or flush is asking for the pump.
    pub pump_active: bool,
    pub schedule_active: bool,
    pub manual_on: bool,
    pub flush_on: bool,
    /// `"HH:MM"`, absent while the wall clock is unsynced.
    pub current_time: Option<String>,
    /// `"Mon"`..`"Sun"`, absent while the wall clock is unsynced.
    pub current_day: Option<String>,
    /// Live controller phase; absent when no controller is reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_speed: Option<f32>,
    pub config: PumpConfig,
}

pub struct SettingsService<C: ConfigPort> {
    store: Arc<ConfigStore>,
    port: C,
    /// Serialises read-derive-persist-publish sequences.
    write_lock: Mutex<()>,
}

impl<C: ConfigPort> SettingsService<C> {
    pub fn new(store: Arc<ConfigStore>, port: C) -> Self {
        Self {
            store,
            port,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Apply a command and return the snapshot now in effect.
    pub fn handle(&self, cmd: AppCommand) -> Result<Arc<PumpConfig>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let next = match cmd {
            AppCommand::ToggleManual => {
                let mut c = (*self.store.read()).clone();
                c.manual_on = !c.manual_on;
                info!("Settings: manual_on -> {}", c.manual_on);
                c
            }
            AppCommand::ToggleFlush => {
                let mut c = (*self.store.read()).clone();
                c.flush_on = !c.flush_on;
                info!("Settings: flush_on -> {}", c.flush_on);
                c
            }
            AppCommand::ToggleEnabled => {
                let mut c = (*self.store.read()).clone();
                c.enabled = !c.enabled;
                info!("Settings: enabled -> {}", c.enabled);
                c
            }
            AppCommand::Update(form) => apply_form(&self.store.read(), &form),
            AppCommand::Reload => {
                let c = self.port.load()?.sanitized();
                self.store.publish(c);
                info!("Settings: reloaded from storage");
                return Ok(self.store.read());
            }
        };

        self.port.save(&next)?;
        self.store.publish(next);
        Ok(self.store.read())
    }

    /// Build a status report from the current snapshot.
    ///
    /// `runtime` is the controller's last published state, or `None`
    /// when the caller cannot see a running controller.
    pub fn status(&self, wall: Option<LocalTime>, runtime: Option<RuntimeSnapshot>) -> StatusReport {
        let config = (*self.store.read()).clone();
        let schedule_active =
            wall.is_some_and(|now| is_schedule_active(&config, now.time, now.weekday));

        StatusReport {
            pump_active: schedule_active || config.manual_on || config.flush_on,
            schedule_active,
            manual_on: config.manual_on,
            flush_on: config.flush_on,
            current_time: wall.map(|now| now.time.hhmm().as_str().to_owned()),
            current_day: wall.map(|now| now.weekday.token().to_owned()),
            phase: runtime.map(|r| r.phase),
            current_speed: runtime.map(|r| r.speed),
            config,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Form handling
// ───────────────────────────────────────────────────────────────

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// Non-empty first value for `key`.
fn field<'a>(form: &'a FormUpdate, key: &'a str) -> Option<&'a str> {
    form.first(key).map(str::trim).filter(|v| !v.is_empty())
}

/// Millisecond field: negative input floors at 0, unparsable input is
/// dropped.
fn apply_ms(form: &FormUpdate, key: &'static str, slot: &mut u32) {
    if let Some(raw) = field(form, key) {
        match raw.parse::<i64>() {
            Ok(v) => *slot = v.clamp(0, u32::MAX as i64) as u32,
            Err(_) => warn!("Settings: invalid integer for {}: {:?}", key, raw),
        }
    }
}

fn apply_speed(form: &FormUpdate, key: &'static str, slot: &mut f32) {
    if let Some(raw) = field(form, key) {
        match raw.parse::<f32>() {
            Ok(v) => *slot = v,
            Err(_) => warn!("Settings: invalid number for {}: {:?}", key, raw),
        }
    }
}

fn apply_time(form: &FormUpdate, key: &'static str, slot: &mut String) {
    if let Some(raw) = field(form, key) {
        match TimeOfDay::parse_hhmm(raw) {
            Some(_) => *slot = raw.to_owned(),
            None => warn!("Settings: invalid time for {}: {:?}", key, raw),
        }
    }
}

/// Overlay a form submission onto `base`.
///
/// The schedule form uses checkbox semantics: when any of its fields is
/// submitted, an absent `enabled` means unchecked and absent
/// `active_days` means no days.
pub fn apply_form(base: &PumpConfig, form: &FormUpdate) -> PumpConfig {
    let mut c = base.clone();

    if let Some(raw) = field(form, "pump_pin") {
        match raw.parse::<u8>() {
            Ok(pin) => c.pump_pin = pin,
            Err(_) => warn!("Settings: invalid pin: {:?}", raw),
        }
    }
    apply_ms(form, "interval_ms", &mut c.interval_ms);
    apply_ms(form, "on_duration_ms", &mut c.on_duration_ms);
    apply_ms(form, "fade_time_ms", &mut c.fade_time_ms);
    apply_speed(form, "pump_speed_min", &mut c.pump_speed_min);
    apply_speed(form, "pump_speed_max", &mut c.pump_speed_max);
    apply_time(form, "start_time", &mut c.start_time);
    apply_time(form, "end_time", &mut c.end_time);

    let schedule_form = SCHEDULE_FORM_KEYS.iter().any(|k| form.contains(k));

    if form.contains("active_days") {
        c.active_days = form
            .values("active_days")
            .filter_map(|token| {
                let day = Weekday::from_token(token);
                if day.is_none() && !token.trim().is_empty() {
                    warn!("Settings: ignoring unknown weekday {:?}", token);
                }
                day
            })
            .collect();
    } else if schedule_form {
        c.active_days = WeekdaySet::EMPTY;
    }

    match form.first("enabled") {
        Some(v) => c.enabled = truthy(v),
        None if schedule_form => c.enabled = false,
        None => {}
    }
    if let Some(v) = form.first("manual_on") {
        c.manual_on = truthy(v);
    }
    if let Some(v) = form.first("flush_on") {
        c.flush_on = truthy(v);
    }

    c.sanitized()
}
