//! Reminder record shared by the host store, the IPC protocol and the UI.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Title shown when a reminder has none
pub const DEFAULT_TITLE: &str = "Reminder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub note: String,
    /// Raw stored instant. Kept verbatim so an unparseable value survives round-trips.
    #[serde(default, deserialize_with = "lenient_time")]
    pub time: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub fired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
}

impl Reminder {
    /// Create an enabled, unfired reminder with a fresh id
    pub fn new(title: impl Into<String>, note: impl Into<String>, at: DateTime<Utc>) -> Self {
        Reminder {
            id: new_reminder_id(),
            title: title.into(),
            note: note.into(),
            time: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            enabled: true,
            fired: false,
            node_id: None,
            routine_id: None,
        }
    }

    /// Parsed fire instant, `None` when the time is missing or unparseable
    pub fn fire_instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.time.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Enabled, not fired, and carrying a valid time
    pub fn is_schedulable(&self) -> bool {
        self.enabled && !self.fired && self.fire_instant().is_some()
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            DEFAULT_TITLE
        } else {
            &self.title
        }
    }

    pub fn display_body(&self) -> &str {
        &self.note
    }
}

pub fn new_reminder_id() -> String {
    format!("rem-{}", uuid::Uuid::new_v4())
}

/// Delay until `when`, clamped to zero for instants at or before `now`
pub fn due_delay(when: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (when - now).to_std().unwrap_or(Duration::ZERO)
}

/// Drop later duplicates of an id, keeping the first occurrence
pub fn dedupe_by_id(reminders: Vec<Reminder>) -> (Vec<Reminder>, usize) {
    let mut seen = HashSet::new();
    let before = reminders.len();
    let unique: Vec<Reminder> = reminders
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    let dropped = before - unique.len();
    (unique, dropped)
}

/// Accepts strings verbatim and epoch-millisecond numbers; anything else loads as no time.
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        _ => None,
    })
}
