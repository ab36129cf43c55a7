//! UI-side reminder scheduler.
//!
//! Owns the live reminder list shown in the UI and arms its own timers for
//! immediate feedback while a window is open. Timer tasks never touch the
//! list: they send a [`DueTimer`] back to the UI event loop, which calls
//! [`UiScheduler::on_timer_elapsed`]. Every mutation rebuilds all timers and
//! marks the list dirty so the loop pushes it to the host.

use super::model::{dedupe_by_id, due_delay, Reminder};
use crate::features::notifications::NotificationDispatcher;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Message sent by an elapsed UI timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTimer {
    pub id: String,
    /// Timer-set generation that armed this timer
    pub generation: u64,
}

/// Result of handling an elapsed timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// Some notification mechanism displayed it
    Notified,
    /// Every mechanism failed; show an in-app alert instead
    NeedsAlert { title: String, body: String },
    /// Stale, fired, disabled or deleted; nothing happened
    Ignored,
}

pub struct UiScheduler {
    reminders: Vec<Reminder>,
    timers: HashMap<String, JoinHandle<()>>,
    generation: u64,
    due_tx: mpsc::UnboundedSender<DueTimer>,
    dirty: bool,
}

impl UiScheduler {
    /// Create an empty scheduler and the receiver for elapsed timers
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DueTimer>) {
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let scheduler = UiScheduler {
            reminders: Vec::new(),
            timers: HashMap::new(),
            generation: 0,
            due_tx,
            dirty: false,
        };
        (scheduler, due_rx)
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn get(&self, id: &str) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    /// Replace the whole list (backup restore, bulk edits)
    pub fn replace_all(&mut self, reminders: Vec<Reminder>) {
        let (reminders, dropped) = dedupe_by_id(reminders);
        if dropped > 0 {
            warn!("Dropped {} reminders with duplicate ids", dropped);
        }
        self.reminders = reminders;
        self.changed();
    }

    pub fn add(&mut self, reminder: Reminder) {
        if self.get(&reminder.id).is_some() {
            warn!("Reminder {} already exists, replacing it", reminder.id);
            self.reminders.retain(|r| r.id != reminder.id);
        }
        self.reminders.push(reminder);
        self.changed();
    }

    /// Replace an existing reminder by id; false when unknown
    pub fn update(&mut self, reminder: Reminder) -> bool {
        match self.reminders.iter_mut().find(|r| r.id == reminder.id) {
            Some(slot) => {
                *slot = reminder;
                self.changed();
                true
            }
            None => false,
        }
    }

    pub fn toggle_enabled(&mut self, id: &str) -> bool {
        match self.reminders.iter_mut().find(|r| r.id == id) {
            Some(r) => {
                r.enabled = !r.enabled;
                self.changed();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.reminders.len();
        self.reminders.retain(|r| r.id != id);
        if self.reminders.len() == before {
            return false;
        }
        self.changed();
        true
    }

    /// Cold-start hydration: a non-empty host set replaces the local list
    pub fn hydrate_from_host(&mut self, reminders: Vec<Reminder>) -> bool {
        if reminders.is_empty() {
            debug!("Host has no persisted reminders, keeping local list");
            return false;
        }
        info!("Hydrating {} reminders from host", reminders.len());
        self.replace_all(reminders);
        true
    }

    /// Reconciliation for a fire the host already dispatched. Never notifies.
    pub fn on_host_fired(&mut self, id: &str) -> bool {
        match self.reminders.iter_mut().find(|r| r.id == id) {
            Some(r) if !r.fired => {
                r.fired = true;
                debug!("Reminder {} fired by host, reconciled", id);
                self.changed();
                true
            }
            _ => false,
        }
    }

    /// Local timer elapsed: notify, then mark fired
    pub async fn on_timer_elapsed(
        &mut self,
        due: DueTimer,
        dispatcher: &NotificationDispatcher,
    ) -> FireOutcome {
        if due.generation != self.generation {
            debug!("Ignoring stale timer for {}", due.id);
            return FireOutcome::Ignored;
        }
        let (title, body) = match self.get(&due.id) {
            Some(r) if r.enabled && !r.fired => {
                (r.display_title().to_string(), r.display_body().to_string())
            }
            _ => return FireOutcome::Ignored,
        };

        info!("Reminder {} due in UI", due.id);
        let shown = dispatcher.attempt_notify(&title, &body).await;

        if let Some(r) = self.reminders.iter_mut().find(|r| r.id == due.id) {
            r.fired = true;
        }
        self.changed();

        if shown {
            FireOutcome::Notified
        } else {
            FireOutcome::NeedsAlert { title, body }
        }
    }

    /// Full list to push to the host, once per mutation burst
    pub fn take_pending_push(&mut self) -> Option<Vec<Reminder>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.reminders.clone())
    }

    pub fn armed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .timers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn changed(&mut self) {
        self.dirty = true;
        self.reschedule();
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    fn reschedule(&mut self) {
        self.cancel_all();
        self.generation += 1;

        let now = Utc::now();
        for reminder in &self.reminders {
            if !reminder.enabled || reminder.fired {
                continue;
            }
            let Some(when) = reminder.fire_instant() else {
                warn!(
                    "Skipping reminder {} with missing or invalid time {:?}",
                    reminder.id, reminder.time
                );
                continue;
            };

            let delay = due_delay(when, now);
            let due = DueTimer {
                id: reminder.id.clone(),
                generation: self.generation,
            };
            let tx = self.due_tx.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(due);
            });
            self.timers.insert(reminder.id.clone(), handle);
        }
    }
}

impl Drop for UiScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
