//! Settings edits travelling through the config file to a running
//! controller's store: SettingsService → JsonFileConfig → ConfigWatcher
//! → ConfigStore.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::mock_hw::*;
use watershed::adapters::json_file::JsonFileConfig;
use watershed::adapters::status_file::{StatusFile, unix_now_ms};
use watershed::adapters::watcher::ConfigWatcher;
use watershed::app::commands::{AppCommand, FormUpdate};
use watershed::app::ports::ConfigPort;
use watershed::app::settings::SettingsService;
use watershed::app::status::RuntimeStatus;
use watershed::config::{PumpConfig, Weekday};
use watershed::fsm::Phase;
use watershed::store::ConfigStore;

static NEXT: AtomicU32 = AtomicU32::new(0);

fn scratch() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "watershed-flow-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&dir).unwrap();
    dir.join("config.json")
}

/// Apply `cmd` the way the CLI does: a fresh service over the file.
/// Sleeps first so the write lands on a new mtime.
fn edit(path: &PathBuf, cmd: AppCommand) -> Arc<PumpConfig> {
    std::thread::sleep(Duration::from_millis(20));
    let file = JsonFileConfig::new(path);
    let svc = SettingsService::new(Arc::new(ConfigStore::new(file.load().unwrap())), file);
    svc.handle(cmd).unwrap()
}

#[test]
fn cli_toggle_reaches_running_store() {
    let path = scratch();
    let file = JsonFileConfig::new(&path);
    let daemon_store = ConfigStore::new(file.load().unwrap());
    let mut watcher = ConfigWatcher::new(&file);
    let mut sink = RecordingSink::default();

    let written = edit(&path, AppCommand::ToggleFlush);
    assert!(written.flush_on);

    assert!(watcher.poll(10_000, &file, &daemon_store, &mut sink));
    assert!(daemon_store.read().flush_on);
}

#[test]
fn partial_schedule_edit_keeps_days_and_enabled() {
    let path = scratch();
    let file = JsonFileConfig::new(&path);
    let mut start = file.load().unwrap();
    start.active_days = [Weekday::Sat, Weekday::Sun].into_iter().collect();
    file.save(&start).unwrap();

    let mut form = FormUpdate::new();
    form.push_assignment("start_time=06:30").unwrap();
    form.complete_schedule_group(&start);
    let cfg = edit(&path, AppCommand::Update(form));

    assert_eq!(cfg.start_time, "06:30");
    assert!(cfg.enabled);
    assert_eq!(cfg.active_days, start.active_days);
    assert_eq!(file.load().unwrap(), *cfg);
}

#[test]
fn full_form_submission_uses_checkbox_semantics() {
    let path = scratch();
    let form: FormUpdate = [("start_time", "07:00"), ("end_time", "07:30")]
        .into_iter()
        .collect();
    let cfg = edit(&path, AppCommand::Update(form));
    assert!(!cfg.enabled);
    assert!(cfg.active_days.is_empty());
}

#[test]
fn status_report_reflects_file_and_clock() {
    let path = scratch();
    let file = JsonFileConfig::new(&path);
    let cfg = PumpConfig {
        start_time: "22:00".into(),
        end_time: "02:00".into(),
        ..PumpConfig::default()
    };
    file.save(&cfg).unwrap();

    let svc = SettingsService::new(Arc::new(ConfigStore::new(file.load().unwrap())), file);
    let runtime = RuntimeStatus::new();
    runtime.publish(Phase::Holding, 0.75);

    let late = svc.status(Some(local(Weekday::Fri, 23, 15)), Some(runtime.snapshot()));
    assert!(late.schedule_active && late.pump_active);
    assert_eq!(late.current_time.as_deref(), Some("23:15"));
    assert_eq!(late.current_day.as_deref(), Some("Fri"));
    assert_eq!(late.phase, Some(Phase::Holding));
    assert_eq!(late.current_speed, Some(0.75));

    let noon = svc.status(Some(local(Weekday::Fri, 12, 0)), None);
    assert!(!noon.schedule_active && !noon.pump_active);

    let unsynced = svc.status(None, None);
    assert!(!unsynced.schedule_active);
    assert!(unsynced.current_time.is_none());

    let json = serde_json::to_value(&late).unwrap();
    assert_eq!(json["config"]["start_time"], "22:00");
}

#[test]
fn daemon_state_reaches_cli_status_through_status_file() {
    let path = scratch();
    let file = JsonFileConfig::new(&path);
    file.save(&PumpConfig::default()).unwrap();

    let runtime = RuntimeStatus::new();
    runtime.publish(Phase::FadingIn, 0.4);
    let mut daemon_side = StatusFile::beside(&path);
    daemon_side.publish(runtime.snapshot(), unix_now_ms()).unwrap();

    let svc = SettingsService::new(Arc::new(ConfigStore::new(file.load().unwrap())), file);
    let cli_side = StatusFile::beside(&path);
    let report = svc.status(None, cli_side.read(unix_now_ms()));
    assert_eq!(report.phase, Some(Phase::FadingIn));
    assert_eq!(report.current_speed, Some(0.4));

    daemon_side.remove();
    let report = svc.status(None, cli_side.read(unix_now_ms()));
    assert_eq!(report.phase, None);
    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("phase").is_none());
    assert!(json.get("current_speed").is_none());
}
