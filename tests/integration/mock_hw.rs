//! Mock hardware adapters for integration tests.
//!
//! Everything shares one simulated millisecond counter, so output calls,
//! sleeps and scripted config edits line up on a single timeline without
//! real time passing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use watershed::app::events::AppEvent;
use watershed::app::ports::{
    Clock, EventSink, LivenessPort, LocalTime, OutputFactory, PumpOutput, WallClock,
};
use watershed::config::{TimeOfDay, Weekday};
use watershed::error::{Error, OutputError, Result};

// ── Output call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Open(u8),
    Speed(f32),
    Close(u8),
}

/// Shared, timestamped record of every output call.
#[derive(Clone)]
pub struct CallLog {
    now: Rc<Cell<u64>>,
    calls: Rc<RefCell<Vec<(u64, OutputCall)>>>,
}

#[allow(dead_code)]
impl CallLog {
    /// Current simulated time.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    fn push(&self, call: OutputCall) {
        self.calls.borrow_mut().push((self.now.get(), call));
    }

    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.borrow().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(u64, OutputCall)> {
        self.calls.borrow().clone()
    }

    pub fn speeds(&self) -> Vec<f32> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(_, c)| match c {
                OutputCall::Speed(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn last_speed(&self) -> Option<f32> {
        self.speeds().last().copied()
    }

    /// Times at which an output was opened.
    pub fn open_times(&self) -> Vec<u64> {
        self.calls
            .borrow()
            .iter()
            .filter(|(_, c)| matches!(c, OutputCall::Open(_)))
            .map(|(t, _)| *t)
            .collect()
    }
}

// ── Clock ─────────────────────────────────────────────────────

type Action = Box<dyn FnOnce()>;

/// Simulated clock: `sleep_ms` advances time instantly and fires any
/// scripted actions that fall due.
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    actions: RefCell<Vec<(u64, Option<Action>)>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            actions: RefCell::new(Vec::new()),
        }
    }

    pub fn log(&self) -> CallLog {
        CallLog {
            now: Rc::clone(&self.now),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Run `action` once simulated time reaches `at_ms`.
    pub fn at(&self, at_ms: u64, action: impl FnOnce() + 'static) {
        self.actions.borrow_mut().push((at_ms, Some(Box::new(action))));
    }

    /// Raise `flag` once simulated time reaches `at_ms`.
    pub fn stop_at(&self, at_ms: u64, flag: &Arc<AtomicBool>) {
        let flag = Arc::clone(flag);
        self.at(at_ms, move || flag.store(true, Ordering::Relaxed));
    }

    fn fire_due(&self) {
        let now = self.now.get();
        let due: Vec<Action> = self
            .actions
            .borrow_mut()
            .iter_mut()
            .filter(|(at, _)| *at <= now)
            .filter_map(|(_, a)| a.take())
            .collect();
        for action in due {
            action();
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn sleep_ms(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
        self.fire_due();
    }
}

// ── Wall clock ────────────────────────────────────────────────

/// Wall clock pinned to a settable reading.
#[derive(Clone)]
pub struct FixedWallClock(pub Rc<Cell<Option<LocalTime>>>);

#[allow(dead_code)]
impl FixedWallClock {
    pub fn at(weekday: Weekday, hour: u8, minute: u8) -> Self {
        Self(Rc::new(Cell::new(Some(local(weekday, hour, minute)))))
    }

    pub fn unsynced() -> Self {
        Self(Rc::new(Cell::new(None)))
    }

    pub fn set(&self, now: Option<LocalTime>) {
        self.0.set(now);
    }
}

impl WallClock for FixedWallClock {
    fn local_now(&self) -> Option<LocalTime> {
        self.0.get()
    }
}

pub fn local(weekday: Weekday, hour: u8, minute: u8) -> LocalTime {
    LocalTime {
        weekday,
        time: TimeOfDay::from_hms(hour, minute, 0).unwrap(),
    }
}

// ── Output + factory ──────────────────────────────────────────

pub struct MockOutput {
    pin: u8,
    speed: f32,
    log: CallLog,
    fail_writes: Rc<Cell<bool>>,
}

impl PumpOutput for MockOutput {
    fn set_speed(&mut self, speed: f32) -> Result<()> {
        if self.fail_writes.get() {
            return Err(Error::Output(OutputError::PwmWriteFailed));
        }
        self.speed = speed.clamp(0.0, 1.0);
        self.log.push(OutputCall::Speed(self.speed));
        Ok(())
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn close(&mut self) {
        self.log.push(OutputCall::Close(self.pin));
    }
}

pub struct MockFactory {
    log: CallLog,
    /// Number of upcoming `open` calls that fail.
    pub failing_opens: Rc<Cell<u32>>,
    pub fail_writes: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl MockFactory {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            failing_opens: Rc::new(Cell::new(0)),
            fail_writes: Rc::new(Cell::new(false)),
        }
    }

    pub fn failing(log: &CallLog, opens: u32) -> Self {
        let f = Self::new(log);
        f.failing_opens.set(opens);
        f
    }
}

impl OutputFactory for MockFactory {
    type Output = MockOutput;

    fn open(&mut self, pin: u8) -> Result<MockOutput> {
        let left = self.failing_opens.get();
        if left > 0 {
            self.failing_opens.set(left - 1);
            return Err(Error::HardwareInit(OutputError::InvalidPin(pin)));
        }
        self.log.push(OutputCall::Open(pin));
        Ok(MockOutput {
            pin,
            speed: 0.0,
            log: self.log.clone(),
            fail_writes: Rc::clone(&self.fail_writes),
        })
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn phase_changes(&self) -> Vec<(watershed::fsm::Phase, watershed::fsm::Phase)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::PhaseChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn faults(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::OutputFault(_)))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Liveness ──────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingLiveness {
    pub feeds: u64,
}

impl LivenessPort for CountingLiveness {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}
