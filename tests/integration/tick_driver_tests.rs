//! TickDriver → PumpService → FSM → fader, one 100 ms control tick at a
//! time.

use std::sync::Arc;

use crate::mock_hw::*;
use watershed::app::events::AppEvent;
use watershed::app::ports::{LocalTime, OutputFactory};
use watershed::app::service::PumpService;
use watershed::app::status::RuntimeStatus;
use watershed::app::tick::TickDriver;
use watershed::config::PumpConfig;
use watershed::fsm::Phase;

const TICK_MS: u64 = 100;

struct Rig {
    driver: TickDriver<CountingLiveness>,
    out: MockOutput,
    log: CallLog,
    sink: RecordingSink,
    status: Arc<RuntimeStatus>,
    factory: MockFactory,
    now: u64,
}

impl Rig {
    fn new(config: &PumpConfig) -> Self {
        let log = ManualClock::new().log();
        let mut factory = MockFactory::new(&log);
        let out = factory.open(config.pump_pin).unwrap();
        let status = Arc::new(RuntimeStatus::new());
        let service = PumpService::new(Arc::new(config.clone()), 0);
        let mut driver =
            TickDriver::new(CountingLiveness::default(), service, Arc::clone(&status));
        let mut sink = RecordingSink::default();
        driver.start(&mut sink);
        Self {
            driver,
            out,
            log,
            sink,
            status,
            factory,
            now: 0,
        }
    }

    fn tick(&mut self, config: &PumpConfig, wall: Option<LocalTime>) {
        self.now += TICK_MS;
        self.driver.on_tick(
            Arc::new(config.clone()),
            self.now,
            wall,
            &mut self.out,
            &mut self.sink,
        );
    }

    fn run(&mut self, config: &PumpConfig, ticks: usize) {
        for _ in 0..ticks {
            self.tick(config, None);
        }
    }

    fn run_until(&mut self, config: &PumpConfig, phase: Phase, max_ticks: usize) {
        for _ in 0..max_ticks {
            if self.driver.service().phase() == phase {
                return;
            }
            self.tick(config, None);
        }
        panic!("never reached {phase}");
    }

    fn phase(&self) -> Phase {
        self.driver.service().phase()
    }
}

fn manual() -> PumpConfig {
    PumpConfig {
        manual_on: true,
        enabled: false,
        ..PumpConfig::default()
    }
}

#[test]
fn liveness_is_fed_exactly_once_per_tick() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    r.run(&cfg, 37);
    assert_eq!(r.driver.liveness().feeds, 37);
    assert_eq!(r.driver.service().tick_count(), 37);
}

#[test]
fn failed_writes_still_feed_and_report() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    r.factory.fail_writes.set(true);
    r.run(&cfg, 5);

    assert_eq!(r.driver.liveness().feeds, 5);
    assert_eq!(r.sink.faults(), 5);
    assert!(r.log.speeds().is_empty());
    // The FSM keeps running; only the output is stuck.
    assert_eq!(r.status.phase(), Phase::FadingIn);
}

#[test]
fn skipped_ticks_feed_liveness() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    r.driver.skip_tick();
    r.driver.skip_tick();
    assert_eq!(r.driver.liveness().feeds, 2);
    assert_eq!(r.driver.service().tick_count(), 0);
}

#[test]
fn full_cycle_then_rest_then_next_cycle() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    r.run(&cfg, 60);

    assert_eq!(
        r.sink.phase_changes(),
        vec![
            (Phase::Idle, Phase::FadingIn),
            (Phase::FadingIn, Phase::Holding),
            (Phase::Holding, Phase::FadingOut),
            (Phase::FadingOut, Phase::Idle),
            (Phase::Idle, Phase::FadingIn),
        ]
    );
    let speeds = r.log.speeds();
    assert!(speeds.iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(speeds.contains(&1.0));
}

#[test]
fn speed_is_written_only_on_change() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    r.run_until(&cfg, Phase::Holding, 20);
    let writes_before = r.log.speeds().len();
    r.run(&cfg, 10);
    assert_eq!(r.log.speeds().len(), writes_before);
    assert_eq!(r.out_speed(), 1.0);
}

#[test]
fn reopened_output_gets_current_speed() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    r.run_until(&cfg, Phase::Holding, 20);
    r.tick(&cfg, None);

    r.out = r.factory.open(cfg.pump_pin).unwrap();
    r.driver.output_replaced();
    let before = r.log.speeds().len();
    r.tick(&cfg, None);
    assert_eq!(r.log.speeds().len(), before + 1);
    assert_eq!(r.log.last_speed(), Some(1.0));
}

#[test]
fn deactivation_preempts_hold_with_smooth_fade_out() {
    let on = manual();
    let off = PumpConfig {
        manual_on: false,
        ..on.clone()
    };
    let mut r = Rig::new(&on);
    r.run_until(&on, Phase::Holding, 20);
    r.tick(&on, None);

    r.tick(&off, None);
    assert_eq!(r.phase(), Phase::FadingOut);
    let from = r.log.speeds().len();
    r.run_until(&off, Phase::Idle, 20);

    let fade_out = &r.log.speeds()[from..];
    assert!(fade_out.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(r.log.last_speed(), Some(0.0));
}

#[test]
fn deactivation_mid_fade_in_reverses_from_current_speed() {
    let on = manual();
    let off = PumpConfig {
        manual_on: false,
        ..on.clone()
    };
    let mut r = Rig::new(&on);
    r.run(&on, 6);
    assert_eq!(r.phase(), Phase::FadingIn);
    let peak = r.log.last_speed().unwrap();
    assert!(peak > 0.0 && peak < 1.0);

    r.tick(&off, None);
    assert_eq!(r.phase(), Phase::FadingOut);
    // No jump to max on the way down.
    assert!(r.log.speeds().iter().all(|s| *s <= peak));
}

#[test]
fn flush_forces_max_and_release_returns_to_idle() {
    let idle = PumpConfig {
        enabled: false,
        ..PumpConfig::default()
    };
    let flush = PumpConfig {
        flush_on: true,
        ..idle.clone()
    };
    let mut r = Rig::new(&idle);
    r.run(&idle, 3);
    assert_eq!(r.log.last_speed(), Some(0.0));

    r.tick(&flush, None);
    assert_eq!(r.phase(), Phase::Flushing);
    assert_eq!(r.log.last_speed(), Some(1.0));

    r.tick(&idle, None);
    assert_eq!(r.phase(), Phase::Idle);
    r.run(&idle, 2);
    assert_eq!(r.log.last_speed(), Some(0.0));
}

#[test]
fn disabled_schedule_ignores_window_but_not_manual() {
    let cfg = PumpConfig {
        enabled: false,
        ..PumpConfig::default()
    };
    let noon = Some(local(watershed::config::Weekday::Wed, 12, 0));
    let mut r = Rig::new(&cfg);
    for _ in 0..5 {
        r.tick(&cfg, noon);
    }
    assert_eq!(r.phase(), Phase::Idle);
    assert!(!r.driver.service().schedule_active());

    let manual = PumpConfig {
        manual_on: true,
        ..cfg
    };
    r.tick(&manual, noon);
    assert_eq!(r.phase(), Phase::FadingIn);
}

#[test]
fn status_mirrors_driver() {
    let cfg = manual();
    let mut r = Rig::new(&cfg);
    assert!(matches!(r.sink.events[0], AppEvent::Started(Phase::Idle)));
    r.run_until(&cfg, Phase::Holding, 20);
    r.tick(&cfg, None);
    assert_eq!(r.status.phase(), Phase::Holding);
    assert_eq!(r.status.speed(), 1.0);
}

impl Rig {
    fn out_speed(&self) -> f32 {
        use watershed::app::ports::PumpOutput;
        self.out.speed()
    }
}
