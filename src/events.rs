//! Control-tick and config-check events from the esp_timer callback to
//! the pump loop.
//!
//! ```text
//!   esp_timer (100 ms) ──ControlTick──▶ ┐
//!   every 10th tick ────ConfigCheck──▶ ├─▶ ring (31 slots) ─▶ main loop
//!                                       ┘     drain_events: feed TWDT,
//!                                             step FSM, re-read NVS
//! ```
//!
//! The timer task is the only producer and the main loop the only
//! consumer.  When the loop stalls long enough to fill the ring, further
//! ticks are dropped; the next drained tick reads the clock afresh, so a
//! fade simply jumps to where it should be.

use core::sync::atomic::{AtomicU8, Ordering};

/// Ring slots; one is kept free to tell full from empty.
const EVENT_QUEUE_CAP: usize = 32;

/// What the pump loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// Feed the watchdog, evaluate the schedule and step the FSM and fader.
    ControlTick = 0,
    /// Re-read the stored config and publish it if it changed.
    ConfigCheck = 1,
}

// ── Ring ──────────────────────────────────────────────────────

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: one producer (timer task) writes the slot at `head` before
// publishing it with a Release store; one consumer reads the slot at
// `tail` after an Acquire load.  Slots are never accessed concurrently.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Queue `event` from the timer callback.  Never blocks; returns `false`
/// and drops the event when the pump loop is 31 events behind.
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false;
    }

    // SAFETY: single producer; see EVENT_BUFFER.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Oldest pending event, if any.  Pump loop only.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None;
    }

    // SAFETY: single consumer; see EVENT_BUFFER.
    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Hand every pending event to `handler`, oldest first.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Events waiting for the pump loop.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::ControlTick),
        1 => Some(Event::ConfigCheck),
        _ => None,
    }
}
