use std::borrow::Cow;

use chrono::{Local, TimeZone};
use serde_json::{Map, Value};

pub const DEFAULT_LABEL: &str = "event";
pub const DEFAULT_SOURCE: &str = "src";
pub const DEFAULT_DESTINATION: &str = "dst";

/// One decoded detection record.
///
/// The payload is kept verbatim, in arrival order, so the detail view can show
/// fields this crate knows nothing about. Nothing is mutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    timestamp: f64,
    fields: Map<String, Value>,
}

impl Event {
    /// Builds an event from a decoded payload. `received_at` (epoch seconds)
    /// stands in for a missing or non-numeric `timestamp`.
    pub fn from_payload(fields: Map<String, Value>, received_at: f64) -> Self {
        let timestamp = fields
            .get("timestamp")
            .and_then(Value::as_f64)
            .unwrap_or(received_at);
        Self { timestamp, fields }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Classification shown in lists: `attack_type`, then `label`, then "event".
    pub fn label(&self) -> Cow<'_, str> {
        self.first_display(&["attack_type", "label"])
            .unwrap_or(Cow::Borrowed(DEFAULT_LABEL))
    }

    pub fn source_address(&self) -> Cow<'_, str> {
        self.first_display(&["src_ip", "src"])
            .unwrap_or(Cow::Borrowed(DEFAULT_SOURCE))
    }

    pub fn destination_address(&self) -> Cow<'_, str> {
        self.first_display(&["dst_ip", "dst"])
            .unwrap_or(Cow::Borrowed(DEFAULT_DESTINATION))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Raw payload fields, in the order they arrived.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Local wall-clock time of the event, `HH:MM:SS`.
    pub fn display_time(&self) -> String {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        match Local.timestamp_opt(secs as i64, nanos).single() {
            Some(at) => at.format("%H:%M:%S").to_string(),
            None => "--:--:--".to_string(),
        }
    }

    /// One list row: time, label, `src → dst`.
    pub fn summary_line(&self) -> String {
        format!(
            "{}  {:<14} {} → {}",
            self.display_time(),
            self.label(),
            self.source_address(),
            self.destination_address()
        )
    }

    /// Pretty-printed payload for the detail view.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }

    // Falsy values ("", 0, false, null) count as absent, same as the dashboard
    // fallbacks. Other scalars are shown as written; arrays and objects are skipped.
    fn first_display(&self, keys: &[&str]) -> Option<Cow<'_, str>> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(Cow::Borrowed(s.as_str())),
                Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => {
                    Some(Cow::Owned(n.to_string()))
                }
                Value::Bool(true) => Some(Cow::Borrowed("true")),
                _ => None,
            })
    }
}
