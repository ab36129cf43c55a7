//! Host-side reminder scheduler.
//!
//! Owns the durable reminder store and one timer task per live reminder.
//! Every replacement of the reminder set cancels all timers and re-arms them
//! from scratch. A timer that elapses fires the reminder at most once: the
//! `fired` flag in the store is the idempotency guard.

use super::model::{due_delay, dedupe_by_id, Reminder};
use super::store::HostStore;
use crate::features::notifications::NotificationDispatcher;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Capacity of the fired-event broadcast channel
const FIRED_CHANNEL_CAPACITY: usize = 64;

/// Store handle shared with the background presence controller
pub type SharedStore = Arc<Mutex<HostStore>>;

/// Emitted after a reminder has fired and been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFired {
    pub id: String,
}

pub struct HostScheduler {
    store: SharedStore,
    /// Lock order: `store` before `timers` and `in_flight`
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Ids whose notification is being shown right now
    in_flight: Mutex<HashSet<String>>,
    dispatcher: NotificationDispatcher,
    fired_tx: broadcast::Sender<ReminderFired>,
    self_ref: Weak<HostScheduler>,
}

impl HostScheduler {
    pub fn new(store: SharedStore, dispatcher: NotificationDispatcher) -> Arc<Self> {
        let (fired_tx, _) = broadcast::channel(FIRED_CHANNEL_CAPACITY);
        Arc::new_cyclic(|self_ref| HostScheduler {
            store,
            timers: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            dispatcher,
            fired_tx,
            self_ref: self_ref.clone(),
        })
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Subscribe to fired events (best-effort; lagging receivers drop events)
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderFired> {
        self.fired_tx.subscribe()
    }

    /// Snapshot of the persisted reminder set
    pub async fn get_all(&self) -> Vec<Reminder> {
        self.store.lock().await.reminders().to_vec()
    }

    /// Arm timers for the store as loaded at startup
    pub async fn start(&self) {
        let store = self.store.lock().await;
        info!("Scheduling {} persisted reminders", store.reminders().len());
        self.reschedule(&store).await;
    }

    /// Replace the whole reminder set, persist it, then re-derive every timer.
    ///
    /// Returns whether the set was persisted; scheduling happens either way.
    pub async fn replace_all(&self, reminders: Vec<Reminder>) -> bool {
        let (reminders, dropped) = dedupe_by_id(reminders);
        if dropped > 0 {
            warn!("Dropped {} reminders with duplicate ids", dropped);
        }

        let mut store = self.store.lock().await;
        store.replace_reminders(reminders);
        let persisted = store.flush();
        self.reschedule(&store).await;
        persisted
    }

    /// Ids with an armed (not yet finished) timer
    pub async fn armed_ids(&self) -> Vec<String> {
        let timers = self.timers.lock().await;
        let mut ids: Vec<String> = timers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Abort every armed timer (used on shutdown)
    pub async fn cancel_all(&self) {
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    async fn reschedule(&self, store: &HostStore) {
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }

        let now = Utc::now();
        for reminder in store.reminders() {
            if !reminder.enabled || reminder.fired {
                continue;
            }
            let Some(when) = reminder.fire_instant() else {
                debug!(
                    "Skipping reminder {} with missing or invalid time {:?}",
                    reminder.id, reminder.time
                );
                continue;
            };

            let delay = due_delay(when, now);
            debug!(
                "Scheduling reminder {} for {} (in {} ms)",
                reminder.id,
                when.to_rfc3339(),
                delay.as_millis()
            );

            let id = reminder.id.clone();
            let scheduler = self.self_ref.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // A rebuild aborts only the wait, never a fire already under way
                if let Some(scheduler) = scheduler.upgrade() {
                    tokio::spawn(async move { scheduler.fire(&id).await });
                }
            });
            timers.insert(reminder.id.clone(), handle);
        }
    }

    /// Timer callback: notify, mark fired, persist, broadcast.
    ///
    /// The store is not locked while the notification is shown.
    pub async fn fire(&self, id: &str) {
        let (title, body) = {
            let store = self.store.lock().await;
            let (title, body) = match store.find(id) {
                None => {
                    debug!("Reminder {} no longer exists, nothing to fire", id);
                    return;
                }
                Some(r) if r.fired || !r.enabled => {
                    debug!("Reminder {} is fired or disabled, not firing again", id);
                    return;
                }
                Some(r) => (r.display_title().to_string(), r.display_body().to_string()),
            };
            if !self.in_flight.lock().await.insert(id.to_string()) {
                debug!("Reminder {} is already being fired", id);
                return;
            }
            (title, body)
        };

        info!("Firing reminder {} ('{}')", id, title);
        let shown = self.dispatcher.attempt_notify(&title, &body).await;
        if !shown {
            warn!("No notification mechanism displayed reminder {}", id);
        }

        let marked = {
            let mut store = self.store.lock().await;
            self.in_flight.lock().await.remove(id);
            let marked = store.mark_fired(id);
            if marked {
                store.flush();
                if let Some(handle) = self.timers.lock().await.remove(id) {
                    handle.abort();
                }
            } else {
                debug!("Reminder {} was removed while notifying", id);
            }
            marked
        };

        if marked && self.fired_tx.send(ReminderFired { id: id.to_string() }).is_err() {
            debug!("No UI listening for fired reminder {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::notifications::dispatcher::testing::{chain, RecordingProvider};
    use crate::features::reminders::store::MemoryBackend;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn reminder_at(id: &str, offset: ChronoDuration) -> Reminder {
        let mut r = Reminder::new(format!("title {id}"), "", Utc::now() + offset);
        r.id = id.to_string();
        r
    }

    fn scheduler_with(
        provider: &Arc<RecordingProvider>,
    ) -> (Arc<HostScheduler>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = Arc::new(Mutex::new(HostStore::load(Box::new(backend.clone()))));
        (HostScheduler::new(store, chain(&[provider])), backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay_and_marks_fired() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, backend) = scheduler_with(&provider);
        let mut fired_rx = scheduler.subscribe();

        let mut r = reminder_at("r1", ChronoDuration::seconds(2));
        r.title = "Call doctor".to_string();
        assert!(scheduler.replace_all(vec![r]).await);
        assert_eq!(scheduler.armed_ids().await, vec!["r1".to_string()]);

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(provider.calls(), vec![("Call doctor".to_string(), String::new())]);
        assert!(scheduler.get_all().await[0].fired);
        assert!(backend.saved().unwrap().reminders[0].fired);
        assert_eq!(fired_rx.recv().await.unwrap(), ReminderFired { id: "r1".to_string() });
        assert!(scheduler.armed_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_stays_available_while_notifying() {
        let provider = RecordingProvider::slow("native", Duration::from_secs(20));
        let (scheduler, _) = scheduler_with(&provider);
        let list = vec![reminder_at("slow", ChronoDuration::seconds(1))];
        scheduler.replace_all(list.clone()).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls().len(), 1);

        let during = tokio::time::timeout(Duration::from_secs(5), scheduler.get_all())
            .await
            .unwrap();
        assert!(!during[0].fired);

        // A push mid-notification re-arms it, but it is not shown twice
        assert!(tokio::time::timeout(Duration::from_secs(5), scheduler.replace_all(list))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(provider.calls().len(), 1);
        assert!(scheduler.get_all().await[0].fired);
        assert!(scheduler.armed_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_reminder_fires_on_next_tick() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);

        scheduler
            .replace_all(vec![reminder_at("late", ChronoDuration::minutes(-5))])
            .await;
        // Not fired synchronously inside replace_all
        assert!(provider.calls().is_empty());
        assert!(!scheduler.get_all().await[0].fired);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(provider.calls().len(), 1);
        assert!(scheduler.get_all().await[0].fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_reminder_never_fires_again() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);

        let mut r = reminder_at("done", ChronoDuration::minutes(-1));
        r.fired = true;
        scheduler.replace_all(vec![r]).await;
        assert!(scheduler.armed_ids().await.is_empty());

        // A stray timer event for it is ignored as well
        scheduler.fire("done").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(provider.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_reminder_is_never_armed() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);

        let mut r = reminder_at("off", ChronoDuration::seconds(1));
        r.enabled = false;
        scheduler.replace_all(vec![r]).await;
        assert!(scheduler.armed_ids().await.is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(provider.calls().is_empty());
        assert!(!scheduler.get_all().await[0].fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_time_is_skipped_not_deleted() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);

        let mut r = reminder_at("bad", ChronoDuration::seconds(1));
        r.time = Some("garbage".to_string());
        scheduler.replace_all(vec![r]).await;

        assert!(scheduler.armed_ids().await.is_empty());
        assert_eq!(scheduler.get_all().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_all_is_idempotent() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);
        let list = vec![
            reminder_at("a", ChronoDuration::seconds(10)),
            reminder_at("b", ChronoDuration::seconds(20)),
        ];

        scheduler.replace_all(list.clone()).await;
        let once = scheduler.armed_ids().await;
        scheduler.replace_all(list).await;
        assert_eq!(scheduler.armed_ids().await, once);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_reminder_does_not_fire() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);

        scheduler
            .replace_all(vec![reminder_at("gone", ChronoDuration::seconds(1))])
            .await;
        scheduler.replace_all(Vec::new()).await;
        assert!(scheduler.armed_ids().await.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.fire("gone").await;
        assert!(provider.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_marked_fired_even_when_dispatch_fails() {
        let provider = RecordingProvider::new("native", false);
        let (scheduler, _) = scheduler_with(&provider);

        scheduler
            .replace_all(vec![reminder_at("r1", ChronoDuration::seconds(1))])
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(provider.calls().len(), 1);
        assert!(scheduler.get_all().await[0].fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_does_not_block_scheduling() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, backend) = scheduler_with(&provider);
        backend.set_fail_writes(true);

        let persisted = scheduler
            .replace_all(vec![reminder_at("r1", ChronoDuration::seconds(1))])
            .await;
        assert!(!persisted);
        assert_eq!(scheduler.armed_ids().await, vec!["r1".to_string()]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_ids_keep_first() {
        let provider = RecordingProvider::new("native", true);
        let (scheduler, _) = scheduler_with(&provider);

        let first = reminder_at("dup", ChronoDuration::seconds(1));
        let mut second = first.clone();
        second.title = "shadow".to_string();
        scheduler.replace_all(vec![first, second]).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls(), vec![("title dup".to_string(), String::new())]);
        assert_eq!(scheduler.get_all().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_arms_loaded_store() {
        let provider = RecordingProvider::new("native", true);
        let backend = MemoryBackend::with_record(crate::features::reminders::store::StoreRecord {
            reminders: vec![reminder_at("boot", ChronoDuration::seconds(1))],
            background_presence_enabled: false,
        });
        let store = Arc::new(Mutex::new(HostStore::load(Box::new(backend))));
        let scheduler = HostScheduler::new(store, chain(&[&provider]));

        scheduler.start().await;
        assert_eq!(scheduler.armed_ids().await, vec!["boot".to_string()]);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls().len(), 1);
    }
}
