//! Pump configuration parameters.
//!
//! All tunable parameters for the Watershed pump.  A `PumpConfig` is an
//! immutable value once published to the [`ConfigStore`](crate::store::ConfigStore);
//! every update produces a new snapshot.  Values come from defaults merged
//! with the on-disk JSON file and are validated once, at that boundary,
//! by [`PumpConfig::sanitized`].

use core::fmt;

use log::warn;
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::control::clamp_speed;

/// Floor for `interval_ms`; keeps the control loop from spinning.
pub const MIN_INTERVAL_MS: u32 = 1000;
/// Floor for `on_duration_ms`.
pub const MIN_ON_DURATION_MS: u32 = 100;

// ═══════════════════════════════════════════════════════════════
//  Weekdays
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Weekday {
    Mon = 0,
    Tue = 1,
    Wed = 2,
    Thu = 3,
    Fri = 4,
    Sat = 5,
    Sun = 6,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    /// Three-letter token used in the config file ("Mon".."Sun").
    pub const fn token(self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.token() == token.trim())
    }

    /// Day index where Monday is 0.
    pub fn from_monday_index(idx: u32) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }

    const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Set of weekdays stored as a 7-bit mask.
///
/// Serialised as a JSON list of tokens (`["Mon", "Wed"]`).  Unknown tokens
/// are skipped with a warning rather than rejecting the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: Self = Self(0);
    pub const EVERY_DAY: Self = Self(0b0111_1111);

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & day.mask() != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= day.mask();
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !day.mask();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Member tokens in Monday-first order.
    pub fn tokens(self) -> heapless::Vec<&'static str, 7> {
        let mut out = heapless::Vec::new();
        for day in Weekday::ALL {
            if self.contains(day) {
                // Capacity equals the number of weekdays.
                let _ = out.push(day.token());
            }
        }
        out
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tokens = self.tokens();
        let mut seq = serializer.serialize_seq(Some(tokens.len()))?;
        for token in &tokens {
            seq.serialize_element(token)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DaysVisitor;

        impl<'de> Visitor<'de> for DaysVisitor {
            type Value = WeekdaySet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of weekday tokens")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<WeekdaySet, A::Error> {
                let mut set = WeekdaySet::EMPTY;
                while let Some(token) = seq.next_element::<String>()? {
                    match Weekday::from_token(&token) {
                        Some(day) => set.insert(day),
                        None => warn!("Config: ignoring unknown weekday '{}'", token),
                    }
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(DaysVisitor)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Time of day
// ═══════════════════════════════════════════════════════════════

/// Wall-clock time of day with one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    secs: u32,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self { secs: 0 };

    pub fn from_hms(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(Self {
            secs: hour as u32 * 3600 + minute as u32 * 60 + second as u32,
        })
    }

    /// Parse an `"HH:MM"` string.  One- or two-digit fields are accepted;
    /// anything else is `None`.
    pub fn parse_hhmm(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        let field = |part: &str| -> Option<u8> {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse().ok()
        };
        Self::from_hms(field(h)?, field(m)?, 0)
    }

    pub fn hour(self) -> u8 {
        (self.secs / 3600) as u8
    }

    pub fn minute(self) -> u8 {
        (self.secs / 60 % 60) as u8
    }

    /// `"HH:MM"` rendering for status reports.
    pub fn hhmm(self) -> heapless::String<8> {
        let mut s = heapless::String::new();
        let _ = fmt::Write::write_fmt(&mut s, format_args!("{:02}:{:02}", self.hour(), self.minute()));
        s
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pump configuration
// ═══════════════════════════════════════════════════════════════

/// Complete pump configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    // --- Output ---
    /// Physical output pin (ignored on fixed-wiring targets).
    pub pump_pin: u8,

    // --- Cycle timing ---
    /// Period between cycle starts (milliseconds).
    pub interval_ms: u32,
    /// Time at max speed per cycle (milliseconds).
    pub on_duration_ms: u32,
    /// Duration of each fade ramp (milliseconds).
    pub fade_time_ms: u32,

    // --- Speeds (0.0 – 1.0) ---
    pub pump_speed_min: f32,
    pub pump_speed_max: f32,

    // --- Schedule window ---
    /// `"HH:MM"`; the window wraps midnight when `end_time < start_time`.
    pub start_time: String,
    pub end_time: String,
    pub active_days: WeekdaySet,

    // --- Overrides ---
    pub manual_on: bool,
    pub flush_on: bool,
    /// Gates the schedule only; manual and flush still run when false.
    pub enabled: bool,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pump_pin: crate::pins::PUMP_PWM_GPIO as u8,

            interval_ms: 5000,
            on_duration_ms: 2000,
            fade_time_ms: 1000,

            pump_speed_min: 0.0,
            pump_speed_max: 1.0,

            start_time: "00:00".into(),
            end_time: "23:59".into(),
            active_days: WeekdaySet::EVERY_DAY,

            manual_on: false,
            flush_on: false,
            enabled: true,
        }
    }
}

impl PumpConfig {
    /// Boundary validation: clamp speeds and apply the timing floors.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.interval_ms = self.interval_ms.max(MIN_INTERVAL_MS);
        self.on_duration_ms = self.on_duration_ms.max(MIN_ON_DURATION_MS);
        self.pump_speed_min = if self.pump_speed_min.is_finite() {
            clamp_speed(self.pump_speed_min)
        } else {
            defaults.pump_speed_min
        };
        self.pump_speed_max = if self.pump_speed_max.is_finite() {
            clamp_speed(self.pump_speed_max)
        } else {
            defaults.pump_speed_max
        };
        self
    }

    /// Overlay the fields of a JSON object onto `base`.
    ///
    /// Each known field is applied on its own; a field whose value has the
    /// wrong type is dropped with a warning and `base` keeps its value.
    /// Unknown keys are ignored.  Returns `None` if `value` is not an object.
    pub fn merge_json(base: &Self, value: &serde_json::Value) -> Option<Self> {
        let overlay = value.as_object()?;
        let mut merged = serde_json::to_value(base).ok()?;

        for (key, field) in overlay {
            let Some(obj) = merged.as_object_mut() else {
                return None;
            };
            if !obj.contains_key(key) {
                continue;
            }
            let previous = obj.insert(key.clone(), field.clone());
            if serde_json::from_value::<Self>(merged.clone()).is_err() {
                warn!("Config: discarding invalid value for '{}': {}", key, field);
                if let (Some(obj), Some(prev)) = (merged.as_object_mut(), previous) {
                    obj.insert(key.clone(), prev);
                }
            }
        }

        serde_json::from_value(merged).ok()
    }

    /// Parsed schedule window, or `None` if either bound is malformed.
    pub fn schedule_window(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        Some((
            TimeOfDay::parse_hhmm(&self.start_time)?,
            TimeOfDay::parse_hhmm(&self.end_time)?,
        ))
    }
}
