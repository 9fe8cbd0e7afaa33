//! BlockingController against mock output, simulated clock and wall clock.
//!
//! Default timings: fade 1000 ms (50 steps of 20 ms), hold 2000 ms,
//! interval 5000 ms, so one manual cycle is
//! `0..1000 fade in · 1000..3000 hold · 3000..4000 fade out · 4000..5000 rest`.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::mock_hw::*;
use watershed::app::blocking::{BlockingController, ERROR_RETRY_MS, HARDWARE_RETRY_MS};
use watershed::app::events::AppEvent;
use watershed::config::{PumpConfig, Weekday, WeekdaySet};
use watershed::fsm::Phase;
use watershed::store::ConfigStore;

type Controller = BlockingController<MockFactory, ManualClock, FixedWallClock, RecordingSink>;

struct Rig {
    ctl: Controller,
    log: CallLog,
    store: Arc<ConfigStore>,
    shutdown: Arc<AtomicBool>,
}

/// Build a controller whose clock is prepared by `script` before it is
/// handed over.
fn rig(
    config: PumpConfig,
    wall: FixedWallClock,
    failing_opens: u32,
    script: impl FnOnce(&ManualClock, &Arc<ConfigStore>, &Arc<AtomicBool>, &MockFactory),
) -> Rig {
    let clock = ManualClock::new();
    let log = clock.log();
    let store = Arc::new(ConfigStore::new(config));
    let shutdown = Arc::new(AtomicBool::new(false));
    let factory = MockFactory::failing(&log, failing_opens);
    script(&clock, &store, &shutdown, &factory);
    let ctl = BlockingController::new(
        Arc::clone(&store),
        factory,
        clock,
        wall,
        RecordingSink::default(),
    )
    .with_shutdown(Arc::clone(&shutdown));
    Rig {
        ctl,
        log,
        store,
        shutdown,
    }
}

fn manual() -> PumpConfig {
    PumpConfig {
        manual_on: true,
        enabled: false,
        ..PumpConfig::default()
    }
}

fn idle() -> PumpConfig {
    PumpConfig {
        enabled: false,
        ..PumpConfig::default()
    }
}

#[test]
fn manual_cycle_runs_in_order() {
    let mut r = rig(manual(), FixedWallClock::unsynced(), 0, |clock, _, stop, _| {
        clock.stop_at(5000, stop);
    });
    r.ctl.run_forever();

    let speeds = r.log.speeds();
    // 51 fade-in writes, 51 fade-out writes, final stop.
    assert_eq!(speeds.len(), 103);
    assert!(speeds[..=50].windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(speeds[50], 1.0);
    assert!(speeds[51..=101].windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(speeds[101], 0.0);
    assert_eq!(speeds[102], 0.0);

    assert_eq!(
        r.ctl.sink().phase_changes(),
        vec![
            (Phase::Idle, Phase::FadingIn),
            (Phase::FadingIn, Phase::Holding),
            (Phase::Holding, Phase::FadingOut),
            (Phase::FadingOut, Phase::Idle),
        ]
    );
    assert_eq!(r.ctl.sink().events[0], AppEvent::Started(Phase::Idle));
    assert_eq!(r.log.calls().first(), Some(&OutputCall::Open(18)));
    assert_eq!(r.log.calls().last(), Some(&OutputCall::Close(18)));
}

#[test]
fn hold_and_rest_durations_follow_config() {
    let mut r = rig(manual(), FixedWallClock::unsynced(), 0, |clock, _, stop, _| {
        clock.stop_at(5000, stop);
    });
    r.ctl.run_forever();

    let timed: Vec<(u64, f32)> = r
        .log
        .timed()
        .into_iter()
        .filter_map(|(t, c)| match c {
            OutputCall::Speed(s) => Some((t, s)),
            _ => None,
        })
        .collect();
    // Fade in ends at 1000, fade out starts after the 2000 ms hold.
    assert_eq!(timed[50], (1000, 1.0));
    assert_eq!(timed[51], (3000, 1.0));
    assert_eq!(timed[101], (4000, 0.0));
    // Rest until the 5000 ms interval is used up.
    assert_eq!(timed[102].0, 5000);
}

#[test]
fn flush_holds_max_and_logs_once() {
    let cfg = PumpConfig {
        flush_on: true,
        pump_speed_max: 0.8,
        ..idle()
    };
    let mut r = rig(cfg, FixedWallClock::unsynced(), 0, |clock, _, stop, _| {
        clock.stop_at(1200, stop);
    });
    r.ctl.run_forever();

    assert_eq!(r.log.speeds(), vec![0.8, 0.8, 0.8, 0.0]);
    assert_eq!(r.ctl.sink().phase_changes(), vec![(Phase::Idle, Phase::Flushing)]);
}

#[test]
fn flush_overrides_disabled_schedule_and_manual() {
    let cfg = PumpConfig {
        flush_on: true,
        manual_on: true,
        ..idle()
    };
    let mut r = rig(cfg, FixedWallClock::unsynced(), 0, |clock, _, stop, _| {
        clock.stop_at(400, stop);
    });
    r.ctl.run_forever();
    assert_eq!(r.ctl.phase(), Phase::Flushing);
    assert_eq!(r.log.speeds()[0], 1.0);
}

#[test]
fn schedule_window_starts_cycle_only_on_active_days() {
    let cfg = PumpConfig {
        start_time: "08:00".into(),
        end_time: "09:00".into(),
        active_days: [Weekday::Mon].into_iter().collect::<WeekdaySet>(),
        ..PumpConfig::default()
    };

    let mut off_day = rig(cfg.clone(), FixedWallClock::at(Weekday::Tue, 8, 30), 0, |c, _, s, _| {
        c.stop_at(1000, s);
    });
    off_day.ctl.run_forever();
    assert!(off_day.log.speeds().iter().all(|s| *s == 0.0));
    assert!(off_day.ctl.sink().phase_changes().is_empty());

    let mut on_day = rig(cfg, FixedWallClock::at(Weekday::Mon, 8, 30), 0, |c, _, s, _| {
        c.stop_at(1000, s);
    });
    on_day.ctl.run_forever();
    assert_eq!(on_day.log.speeds()[50], 1.0);
}

#[test]
fn hardware_init_failure_backs_off_five_seconds() {
    let mut r = rig(idle(), FixedWallClock::unsynced(), 2, |clock, _, stop, _| {
        clock.stop_at(2 * HARDWARE_RETRY_MS + 300, stop);
    });
    r.ctl.run_forever();

    assert_eq!(r.log.open_times(), vec![2 * HARDWARE_RETRY_MS]);
    assert_eq!(r.ctl.sink().faults(), 2);
}

#[test]
fn write_failure_backs_off_one_second() {
    let mut r = rig(idle(), FixedWallClock::unsynced(), 0, |clock, _, stop, factory| {
        factory.fail_writes.set(true);
        let fail = Rc::clone(&factory.fail_writes);
        clock.at(ERROR_RETRY_MS + 500, move || fail.set(false));
        clock.stop_at(2 * ERROR_RETRY_MS + 100, stop);
    });
    r.ctl.run_forever();

    let first_write = r
        .log
        .timed()
        .into_iter()
        .find(|(_, c)| matches!(c, OutputCall::Speed(_)))
        .map(|(t, _)| t);
    assert_eq!(first_write, Some(2 * ERROR_RETRY_MS));
    assert_eq!(r.ctl.sink().faults(), 2);
}

#[test]
fn pin_change_reopens_output() {
    let mut r = rig(idle(), FixedWallClock::unsynced(), 0, |clock, store, stop, _| {
        let store = Arc::clone(store);
        clock.at(700, move || {
            store.modify(|c| PumpConfig {
                pump_pin: 12,
                ..c.clone()
            });
        });
        clock.stop_at(1200, stop);
    });
    r.ctl.run_forever();

    let calls = r.log.calls();
    let close_old = calls.iter().position(|c| *c == OutputCall::Close(18));
    let open_new = calls.iter().position(|c| *c == OutputCall::Open(12));
    assert!(close_old.is_some() && open_new.is_some());
    assert!(close_old < open_new);
    assert_eq!(calls.last(), Some(&OutputCall::Close(12)));
    assert_eq!(r.store.read().pump_pin, 12);
}

#[test]
fn shutdown_during_hold_stops_at_zero() {
    let mut r = rig(manual(), FixedWallClock::unsynced(), 0, |clock, _, stop, _| {
        clock.stop_at(2000, stop);
    });
    r.ctl.run_forever();

    assert_eq!(r.log.last_speed(), Some(0.0));
    assert_eq!(r.log.speeds().len(), 52);
    assert_eq!(r.ctl.phase(), Phase::Holding);
    assert!(r.shutdown.load(std::sync::atomic::Ordering::Relaxed));
}

#[test]
fn runtime_status_tracks_live_speed() {
    let seen = Rc::new(Cell::new((Phase::Idle, 0.0f32)));
    let status = Arc::new(watershed::app::status::RuntimeStatus::new());
    let mut r = rig(manual(), FixedWallClock::unsynced(), 0, |clock, _, stop, _| {
        let (seen, status) = (Rc::clone(&seen), Arc::clone(&status));
        clock.at(2000, move || seen.set((status.phase(), status.speed())));
        clock.stop_at(2100, stop);
    });
    r.ctl = r.ctl.with_status(Arc::clone(&status));
    r.ctl.run_forever();

    assert_eq!(seen.get(), (Phase::Holding, 1.0));
    assert_eq!(status.speed(), 0.0);
}

#[test]
fn config_edit_applies_at_next_iteration() {
    let mut r = rig(idle(), FixedWallClock::unsynced(), 0, |clock, store, stop, _| {
        let store = Arc::clone(store);
        clock.at(600, move || {
            store.modify(|c| PumpConfig {
                manual_on: true,
                ..c.clone()
            });
        });
        clock.stop_at(1500, stop);
    });
    r.ctl.run_forever();

    // Idle pulses at 0 and 500, then the cycle begins at 1000.
    assert_eq!(
        r.ctl.sink().phase_changes().first(),
        Some(&(Phase::Idle, Phase::FadingIn))
    );
    let timed = r.log.timed();
    let first_rise = timed
        .iter()
        .find(|(_, c)| matches!(c, OutputCall::Speed(s) if *s > 0.0))
        .map(|(t, _)| *t);
    assert_eq!(first_rise, Some(1020));
}

#[test]
fn leaving_flush_with_manual_on_fades_from_max() {
    let cfg = PumpConfig {
        flush_on: true,
        pump_speed_min: 0.2,
        pump_speed_max: 0.9,
        ..manual()
    };
    let mut r = rig(cfg, FixedWallClock::unsynced(), 0, |clock, store, stop, _| {
        let store = Arc::clone(store);
        clock.at(700, move || {
            store.modify(|c| PumpConfig {
                flush_on: false,
                ..c.clone()
            });
        });
        clock.stop_at(2500, stop);
    });
    r.ctl.run_forever();

    let timed: Vec<(u64, f32)> = r
        .log
        .timed()
        .into_iter()
        .filter_map(|(t, c)| match c {
            OutputCall::Speed(s) => Some((t, s)),
            _ => None,
        })
        .collect();
    // Flush pulses at 0 and 500; the cycle starts at 1000.
    assert_eq!(timed[..2], [(0, 0.9), (500, 0.9)]);
    let after_flush: Vec<f32> = timed
        .iter()
        .filter(|(t, _)| *t >= 1000)
        .map(|(_, s)| *s)
        .collect();
    assert_eq!(after_flush[0], 0.9);
    // Fade in runs max -> max, then the hold keeps max until shutdown.
    assert!(after_flush[..=50].iter().all(|s| *s == 0.9));
    assert!(!after_flush[..after_flush.len() - 1].contains(&0.2));
    assert_eq!(
        r.ctl.sink().phase_changes(),
        vec![
            (Phase::Idle, Phase::Flushing),
            (Phase::Flushing, Phase::Idle),
            (Phase::Idle, Phase::FadingIn),
            (Phase::FadingIn, Phase::Holding),
        ]
    );
}
