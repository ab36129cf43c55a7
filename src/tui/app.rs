//! # TUI Application Core
//!
//! Main application state and screen navigation. Holds the UI scheduler;
//! everything here is synchronous so the binary's loop decides when to talk
//! to the host.

use crate::features::backups::BackupInfo;
use crate::features::presence::CloseDecision;
use crate::features::reminders::when::parse_when;
use crate::features::reminders::{DueTimer, FireOutcome, Reminder, UiScheduler};
use crate::ipc::HostEvent;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use serde_json::json;
use tokio::sync::mpsc;

/// Available screens in the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Reminders,
    Backups,
    Settings,
    Help,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Reminders => "Reminders",
            Screen::Backups => "Backups",
            Screen::Settings => "Settings",
            Screen::Help => "Help",
        }
    }

    pub fn key(&self) -> char {
        match self {
            Screen::Reminders => '1',
            Screen::Backups => '2',
            Screen::Settings => '3',
            Screen::Help => '?',
        }
    }

    pub fn all() -> &'static [Screen] {
        &[
            Screen::Reminders,
            Screen::Backups,
            Screen::Settings,
            Screen::Help,
        ]
    }
}

/// Input mode for text entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// In-app alert shown when no notification mechanism worked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

/// Main application state
pub struct App {
    /// Current screen
    pub current_screen: Screen,
    /// Whether the app should quit
    pub should_quit: bool,
    /// IPC connection status
    pub connected: bool,
    /// Local reminder list and timers
    pub scheduler: UiScheduler,
    /// Last fetched backup listing
    pub backups: Vec<BackupInfo>,
    /// Name and content of the backup being viewed
    pub backup_preview: Option<(String, String)>,
    /// Host-side background presence flag, once known
    pub background_enabled: Option<bool>,
    /// Pending in-app alert
    pub alert: Option<Alert>,
    /// Host's answer to the last window close
    pub close_decision: Option<CloseDecision>,
    /// Current input mode
    pub input_mode: InputMode,
    /// Input buffer for text entry
    pub input_buffer: String,
    /// Selected index for lists
    pub selected_index: usize,
    /// Error message to display
    pub error_message: Option<String>,
    /// Status message to display
    pub status_message: Option<String>,
    /// Last heartbeat timestamp
    pub last_heartbeat: Option<i64>,
    /// Activity log (recent events)
    pub activity_log: Vec<String>,
}

impl App {
    /// New app plus the receiver its reminder timers report to
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DueTimer>) {
        let (scheduler, due_rx) = UiScheduler::new();
        let app = App {
            current_screen: Screen::Reminders,
            should_quit: false,
            connected: false,
            scheduler,
            backups: Vec::new(),
            backup_preview: None,
            background_enabled: None,
            alert: None,
            close_decision: None,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            selected_index: 0,
            error_message: None,
            status_message: None,
            last_heartbeat: None,
            activity_log: Vec::new(),
        };
        (app, due_rx)
    }

    /// Switch to a different screen
    pub fn switch_screen(&mut self, screen: Screen) {
        self.current_screen = screen;
        self.selected_index = 0;
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
        self.backup_preview = None;
    }

    /// Handle a pushed event from the host
    pub fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::ReminderFired { id } => {
                if self.scheduler.on_host_fired(&id) {
                    let title = self
                        .scheduler
                        .get(&id)
                        .map(|r| r.display_title().to_string())
                        .unwrap_or_default();
                    self.add_activity(format!("Host fired: {}", title));
                }
            }
            HostEvent::Heartbeat { timestamp } => {
                self.last_heartbeat = Some(timestamp);
            }
            HostEvent::ShuttingDown => {
                self.set_connected(false);
                self.add_activity("Host is shutting down".to_string());
                self.error_message = Some("Host shut down".to_string());
            }
            HostEvent::Response { request_id, .. } => {
                log::debug!("Ignoring stray response {}", request_id);
            }
        }
    }

    /// Apply the result of a locally fired reminder
    pub fn on_fire_outcome(&mut self, outcome: FireOutcome) {
        match outcome {
            FireOutcome::Notified => {
                self.add_activity("Reminder notification shown".to_string());
            }
            FireOutcome::NeedsAlert { title, body } => {
                self.add_activity(format!("Reminder: {}", title));
                self.alert = Some(Alert { title, body });
            }
            FireOutcome::Ignored => {}
        }
    }

    pub fn dismiss_alert(&mut self) -> bool {
        self.alert.take().is_some()
    }

    /// Parse `title | note | when` (or `title | when`) and add the reminder
    pub fn add_reminder_from_input(&mut self, input: &str, now: DateTime<Local>) -> Result<String> {
        let parts: Vec<&str> = input.split('|').map(str::trim).collect();
        let (title, note, when) = match parts.as_slice() {
            [title, when] => (*title, "", *when),
            [title, note, when] => (*title, *note, *when),
            _ => return Err(anyhow!("Use: title | note | when")),
        };
        let at = parse_when(when, now)
            .ok_or_else(|| anyhow!("Unrecognised time '{}' (try +30m, 17:45 or RFC 3339)", when))?;

        let reminder = Reminder::new(title, note, at);
        let id = reminder.id.clone();
        self.scheduler.add(reminder);
        self.selected_index = self.scheduler.reminders().len().saturating_sub(1);
        Ok(id)
    }

    pub fn selected_reminder(&self) -> Option<&Reminder> {
        self.scheduler.reminders().get(self.selected_index)
    }

    pub fn toggle_selected_reminder(&mut self) -> Option<bool> {
        let id = self.selected_reminder()?.id.clone();
        self.scheduler.toggle_enabled(&id);
        self.scheduler.get(&id).map(|r| r.enabled)
    }

    pub fn delete_selected_reminder(&mut self) -> Option<Reminder> {
        let reminder = self.selected_reminder()?.clone();
        self.scheduler.remove(&reminder.id);
        let len = self.scheduler.reminders().len();
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
        Some(reminder)
    }

    pub fn selected_backup(&self) -> Option<&BackupInfo> {
        self.backups.get(self.selected_index)
    }

    pub fn set_backups(&mut self, backups: Vec<BackupInfo>) {
        self.backups = backups;
        if self.selected_index >= self.backups.len() {
            self.selected_index = self.backups.len().saturating_sub(1);
        }
    }

    /// Board snapshot written by save-backup
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "reminders": self.scheduler.reminders(),
            "backgroundPresenceEnabled": self.background_enabled.unwrap_or(false),
            "savedAt": chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Replace the local list with the `reminders` array of a backup
    pub fn restore_from_backup(&mut self, content: &str) -> Result<usize> {
        let value: serde_json::Value =
            serde_json::from_str(content).context("Backup is not valid JSON")?;
        let reminders = value
            .get("reminders")
            .cloned()
            .ok_or_else(|| anyhow!("Backup has no reminders"))?;
        let reminders: Vec<Reminder> =
            serde_json::from_value(reminders).context("Backup reminders are malformed")?;
        let count = reminders.len();
        self.scheduler.replace_all(reminders);
        self.selected_index = 0;
        Ok(count)
    }

    /// Add an activity log entry
    pub fn add_activity(&mut self, msg: String) {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        self.activity_log.push(format!("[{}] {}", timestamp, msg));

        // Keep only last 100 entries
        if self.activity_log.len() > 100 {
            self.activity_log.remove(0);
        }
    }

    /// Set connection status
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Clear error message
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Clear status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Length of the list shown on the current screen
    pub fn current_list_len(&self) -> usize {
        match self.current_screen {
            Screen::Reminders => self.scheduler.reminders().len(),
            Screen::Backups => self.backups.len(),
            Screen::Settings => 1,
            Screen::Help => 0,
        }
    }

    /// Move selection up
    pub fn select_previous(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    /// Move selection down
    pub fn select_next(&mut self, max: usize) {
        if self.selected_index < max.saturating_sub(1) {
            self.selected_index += 1;
        }
    }

    /// Enter editing mode
    pub fn start_editing(&mut self) {
        self.input_mode = InputMode::Editing;
    }

    /// Exit editing mode
    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Add character to input buffer
    pub fn input_char(&mut self, c: char) {
        self.input_buffer.push(c);
    }

    /// Remove last character from input buffer
    pub fn input_backspace(&mut self) {
        self.input_buffer.pop();
    }

    /// Clear input buffer
    pub fn input_clear(&mut self) {
        self.input_buffer.clear();
    }

    /// Get and clear input buffer
    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nine_am() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).earliest().unwrap()
    }

    #[tokio::test]
    async fn test_add_reminder_from_input() {
        let (mut app, _due_rx) = App::new();

        let id = app
            .add_reminder_from_input("Call doctor | bring card | +2h", nine_am())
            .unwrap();
        let added = app.scheduler.get(&id).unwrap();
        assert_eq!(added.title, "Call doctor");
        assert_eq!(added.note, "bring card");
        assert!(added.enabled && !added.fired);

        app.add_reminder_from_input("Stretch | 17:30", nine_am()).unwrap();
        assert_eq!(app.scheduler.reminders()[1].note, "");
        assert_eq!(app.selected_index, 1);

        assert!(app.add_reminder_from_input("no separator", nine_am()).is_err());
        assert!(app.add_reminder_from_input("x | someday", nine_am()).is_err());
    }

    #[tokio::test]
    async fn test_host_fired_event_marks_without_alert() {
        let (mut app, _due_rx) = App::new();
        let id = app
            .add_reminder_from_input("Call doctor | +1h", Local::now())
            .unwrap();

        app.handle_host_event(HostEvent::ReminderFired { id: id.clone() });

        assert!(app.scheduler.get(&id).unwrap().fired);
        assert!(app.alert.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_time_is_an_input_error() {
        let (mut app, _due_rx) = App::new();
        assert!(app
            .add_reminder_from_input("Someday | +99999999999999w", nine_am())
            .is_err());
        assert!(app.scheduler.reminders().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_and_delete_selected() {
        let (mut app, _due_rx) = App::new();
        app.add_reminder_from_input("a | +1h", Local::now()).unwrap();
        app.add_reminder_from_input("b | +1h", Local::now()).unwrap();

        assert_eq!(app.toggle_selected_reminder(), Some(false));
        let removed = app.delete_selected_reminder().unwrap();
        assert_eq!(removed.title, "b");
        assert_eq!(app.selected_index, 0);
        assert_eq!(app.scheduler.reminders().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_from_backup_replaces_list() {
        let (mut app, _due_rx) = App::new();
        app.add_reminder_from_input("old | +1h", Local::now()).unwrap();
        app.scheduler.take_pending_push();

        let backup = json!({
            "reminders": [
                {"id": "r1", "title": "Call doctor", "time": "2030-01-01T10:00:00Z", "enabled": true},
                {"id": "r2", "title": "Broken", "time": "not a time", "enabled": true}
            ]
        })
        .to_string();

        assert_eq!(app.restore_from_backup(&backup).unwrap(), 2);
        let ids: Vec<&str> = app.scheduler.reminders().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(app.scheduler.armed_ids(), vec!["r1".to_string()]);
        assert!(app.scheduler.take_pending_push().is_some());

        assert!(app.restore_from_backup("{\"nodes\": []}").is_err());
        assert!(app.restore_from_backup("not json").is_err());
    }

    #[tokio::test]
    async fn test_alert_outcome_and_dismiss() {
        let (mut app, _due_rx) = App::new();
        app.on_fire_outcome(FireOutcome::NeedsAlert {
            title: "Reminder".to_string(),
            body: String::new(),
        });
        assert!(app.alert.is_some());
        assert!(app.dismiss_alert());
        assert!(!app.dismiss_alert());
    }

    #[tokio::test]
    async fn test_snapshot_contains_reminders() {
        let (mut app, _due_rx) = App::new();
        app.add_reminder_from_input("a | +1h", Local::now()).unwrap();
        let snapshot = app.snapshot();
        assert_eq!(snapshot["reminders"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["backgroundPresenceEnabled"], false);
    }
}
