//! # Feature: Background Presence
//!
//! Decides whether the host stays resident when UI windows close. While
//! background-resident, a presence affordance (the resident marker) exists
//! and closing a window only hides it; while foreground-only, closing the
//! last window terminates the host.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: true

use crate::features::reminders::SharedStore;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    ForegroundOnly,
    BackgroundResident,
}

/// What the UI should do with a window the user asked to close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseDecision {
    /// Host stays alive; the window goes away but timers keep running
    Hide,
    /// Window closes normally
    Close,
}

/// Visible sign that the host is running in the background
pub trait PresenceAffordance: Send + Sync {
    fn create(&mut self) -> Result<()>;
    fn destroy(&mut self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ResidentMarkerFile {
    pid: u32,
    since: String,
}

/// Writes `resident.json` (pid, since) into the data directory
pub struct ResidentMarker {
    path: PathBuf,
}

impl ResidentMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResidentMarker { path: path.into() }
    }
}

impl PresenceAffordance for ResidentMarker {
    fn create(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = ResidentMarkerFile {
            pid: std::process::id(),
            since: chrono::Utc::now().to_rfc3339(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&payload)?)
            .with_context(|| format!("writing {}", self.path.display()))
    }

    fn destroy(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("removing {}", self.path.display()))?;
        }
        Ok(())
    }
}

pub struct BackgroundPresence {
    store: SharedStore,
    affordance: Box<dyn PresenceAffordance>,
    present: bool,
    force_quit: bool,
}

impl BackgroundPresence {
    pub fn new(store: SharedStore, affordance: Box<dyn PresenceAffordance>) -> Self {
        BackgroundPresence {
            store,
            affordance,
            present: false,
            force_quit: false,
        }
    }

    /// Startup: create the affordance if the persisted flag asks for it
    pub async fn restore(&mut self) {
        if self.store.lock().await.background_presence_enabled() {
            info!("Background presence enabled at startup");
            self.ensure_affordance();
        }
    }

    pub async fn enabled(&self) -> bool {
        self.store.lock().await.background_presence_enabled()
    }

    pub async fn state(&self) -> PresenceState {
        if self.enabled().await {
            PresenceState::BackgroundResident
        } else {
            PresenceState::ForegroundOnly
        }
    }

    pub fn affordance_present(&self) -> bool {
        self.present
    }

    /// Persist the flag, then create or tear down the affordance. Returns whether it persisted.
    pub async fn set_enabled(&mut self, enabled: bool) -> bool {
        let persisted = {
            let mut store = self.store.lock().await;
            let previous = store.background_presence_enabled();
            store.set_background_presence_enabled(enabled);
            info!("Background presence {} -> {}", previous, enabled);
            store.flush()
        };

        if enabled {
            self.ensure_affordance();
        } else {
            self.destroy_affordance();
        }
        persisted
    }

    /// Window close request. Hides instead of closing while resident, unless quitting.
    pub async fn on_window_close(&mut self) -> CloseDecision {
        if !self.force_quit && self.enabled().await {
            info!("Window close intercepted, staying resident in background");
            self.ensure_affordance();
            CloseDecision::Hide
        } else {
            CloseDecision::Close
        }
    }

    /// Last window went away; returns whether the host should terminate
    pub async fn on_all_windows_closed(&self) -> bool {
        if self.force_quit {
            return true;
        }
        let resident = self.enabled().await;
        debug!("All windows closed (resident={})", resident);
        // macOS apps conventionally linger until an explicit quit
        !resident && !cfg!(target_os = "macos")
    }

    /// Explicit quit: always terminates
    pub fn quit(&mut self) {
        info!("Quit requested");
        self.force_quit = true;
    }

    pub fn is_quitting(&self) -> bool {
        self.force_quit
    }

    /// Remove the affordance on the way out without touching the persisted flag
    pub fn shutdown(&mut self) {
        self.destroy_affordance();
    }

    fn ensure_affordance(&mut self) {
        if self.present {
            debug!("Presence affordance already exists");
            return;
        }
        match self.affordance.create() {
            Ok(()) => {
                self.present = true;
                info!("Presence affordance created");
            }
            Err(e) => warn!("Failed creating presence affordance: {:#}", e),
        }
    }

    fn destroy_affordance(&mut self) {
        if !self.present {
            return;
        }
        if let Err(e) = self.affordance.destroy() {
            warn!("Failed destroying presence affordance: {:#}", e);
        }
        self.present = false;
        info!("Presence affordance destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::store::{HostStore, MemoryBackend, StoreRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct CountingAffordance {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    impl PresenceAffordance for CountingAffordance {
        fn create(&mut self) -> Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn destroy(&mut self) -> Result<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn presence(flag: bool) -> (BackgroundPresence, CountingAffordance, MemoryBackend) {
        let backend = MemoryBackend::with_record(StoreRecord {
            reminders: Vec::new(),
            background_presence_enabled: flag,
        });
        let store = Arc::new(Mutex::new(HostStore::load(Box::new(backend.clone()))));
        let affordance = CountingAffordance::default();
        (
            BackgroundPresence::new(store, Box::new(affordance.clone())),
            affordance,
            backend,
        )
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_presence_can_be_shared_across_tasks() {
        // Borrowed across awaits inside spawned server tasks
        assert_send_sync::<BackgroundPresence>();
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let (mut presence, affordance, backend) = presence(false);

        assert!(presence.set_enabled(true).await);
        assert!(presence.set_enabled(true).await);

        assert_eq!(affordance.created.load(Ordering::SeqCst), 1);
        assert!(presence.affordance_present());
        assert_eq!(presence.state().await, PresenceState::BackgroundResident);
        assert!(backend.saved().unwrap().background_presence_enabled);
    }

    #[tokio::test]
    async fn test_disable_tears_down() {
        let (mut presence, affordance, backend) = presence(false);
        presence.set_enabled(true).await;
        presence.set_enabled(false).await;

        assert_eq!(affordance.destroyed.load(Ordering::SeqCst), 1);
        assert!(!presence.affordance_present());
        assert_eq!(presence.state().await, PresenceState::ForegroundOnly);
        assert!(!backend.saved().unwrap().background_presence_enabled);
    }

    #[tokio::test]
    async fn test_restore_creates_affordance_from_flag() {
        let (mut resident, affordance, _) = presence(true);
        resident.restore().await;
        assert_eq!(affordance.created.load(Ordering::SeqCst), 1);

        let (mut foreground, affordance, _) = presence(false);
        foreground.restore().await;
        assert_eq!(affordance.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_hides_while_resident() {
        let (mut presence, _, _) = presence(true);
        assert_eq!(presence.on_window_close().await, CloseDecision::Hide);
        assert!(!presence.on_all_windows_closed().await);
    }

    #[tokio::test]
    async fn test_close_terminates_when_foreground_only() {
        let (mut presence, _, _) = presence(false);
        assert_eq!(presence.on_window_close().await, CloseDecision::Close);
        assert_eq!(
            presence.on_all_windows_closed().await,
            !cfg!(target_os = "macos")
        );
    }

    #[tokio::test]
    async fn test_quit_overrides_residency() {
        let (mut presence, _, _) = presence(true);
        presence.quit();
        assert_eq!(presence.on_window_close().await, CloseDecision::Close);
        assert!(presence.on_all_windows_closed().await);
    }

    #[test]
    fn test_resident_marker_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resident.json");
        let mut marker = ResidentMarker::new(&path);

        marker.create().unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(&std::process::id().to_string()));

        marker.destroy().unwrap();
        assert!(!path.exists());
        marker.destroy().unwrap();
    }
}
