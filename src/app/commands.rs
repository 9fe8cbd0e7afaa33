//! Inbound commands to the settings service.
//!
//! These represent actions requested by the outside world (CLI, an HTTP
//! front end, a button) that the
//! [`SettingsService`](super::settings::SettingsService) applies to the
//! shared configuration.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Flip `manual_on`.
    ToggleManual,

    /// Flip `flush_on`.
    ToggleFlush,

    /// Flip `enabled` (gates the schedule only).
    ToggleEnabled,

    /// Apply form-style key/value pairs.
    Update(FormUpdate),

    /// Re-read persistent config and publish it.
    Reload,
}

/// Ordered key/value pairs as submitted by a settings form.
///
/// Keys may repeat (`active_days=Mon&active_days=Tue`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormUpdate {
    fields: Vec<(String, String)>,
}

impl FormUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Parse a `KEY=VALUE` argument.  `active_days` also accepts a
    /// comma-separated list (`active_days=Mon,Wed`).
    pub fn push_assignment(&mut self, arg: &str) -> Option<()> {
        let (key, value) = arg.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        if key == "active_days" {
            for day in value.split(',') {
                self.push(key, day.trim());
            }
        } else {
            self.push(key, value.trim());
        }
        Some(())
    }

    /// Fill the schedule group's checkbox fields from `current` when the
    /// caller only names some of them.  Used by surfaces that edit single
    /// fields (the CLI) rather than submitting the whole form.
    pub fn complete_schedule_group(&mut self, current: &crate::config::PumpConfig) {
        let touches_group = ["start_time", "end_time", "enabled", "active_days"]
            .iter()
            .any(|k| self.contains(k));
        if !touches_group {
            return;
        }
        if !self.contains("enabled") {
            self.push("enabled", current.enabled.to_string());
        }
        if !self.contains("active_days") {
            for token in current.active_days.tokens() {
                self.push("active_days", token);
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// First value submitted for `key`.
    pub fn first<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        self.values(key).next()
    }

    /// Every value submitted for `key`, in order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormUpdate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (k, v) in iter {
            form.push(k, v);
        }
        form
    }
}
