//! # IPC Server
//!
//! Unix socket server through which the host serves UI clients.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Request/response correlation, per-client response routing,
//!   reminder-fired forwarding and window lifecycle tracking
//! - 1.0.0: Initial IPC implementation with Unix socket protocol

use crate::features::backups::BackupStore;
use crate::features::notifications::NotificationDispatcher;
use crate::features::presence::BackgroundPresence;
use crate::features::reminders::HostScheduler;
use crate::ipc::protocol::{encode_message, read_frame, HostEvent, HostRequest, HostResponse};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Maximum number of connected UI clients
const MAX_CLIENTS: usize = 10;

/// Broadcast channel capacity for events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Response channel capacity per client
const RESPONSE_CHANNEL_CAPACITY: usize = 64;

/// IPC server handle for the host
pub struct IpcServer {
    socket_path: PathBuf,
    scheduler: Arc<HostScheduler>,
    presence: Mutex<BackgroundPresence>,
    backups: BackupStore,
    dispatcher: NotificationDispatcher,
    /// Broadcast sender for events to all clients
    event_tx: broadcast::Sender<HostEvent>,
    /// Connected client count
    client_count: Arc<RwLock<usize>>,
    shutdown: Notify,
    shutting_down: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for IpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcServer")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl IpcServer {
    /// Create a new IPC server (does not start listening yet)
    pub fn new(
        socket_path: impl Into<PathBuf>,
        scheduler: Arc<HostScheduler>,
        presence: BackgroundPresence,
        backups: BackupStore,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        IpcServer {
            socket_path: socket_path.into(),
            scheduler,
            presence: Mutex::new(presence),
            backups,
            dispatcher,
            event_tx,
            client_count: Arc::new(RwLock::new(0)),
            shutdown: Notify::new(),
            shutting_down: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn scheduler(&self) -> &Arc<HostScheduler> {
        &self.scheduler
    }

    /// Bind the socket and start the accept loop and reminder-fired forwarder.
    ///
    /// Fails without touching the socket when another host is answering on it.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.socket_path.exists() {
            if UnixStream::connect(&self.socket_path).await.is_ok() {
                anyhow::bail!(
                    "another host is already running on {}",
                    self.socket_path.display()
                );
            }
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("removing stale socket {}", self.socket_path.display()))?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("binding {}", self.socket_path.display()))?;
        info!("IPC server listening on {}", self.socket_path.display());

        let server = self.clone();
        let accept = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => server.clone().admit(stream).await,
                    Err(e) => {
                        error!("Failed to accept IPC connection: {}", e);
                    }
                }
            }
        });

        let forwarder = self.clone().spawn_fired_forwarder();
        let mut tasks = self.tasks.lock().await;
        tasks.push(accept);
        tasks.push(forwarder);
        Ok(())
    }

    /// Re-create the presence affordance if the persisted flag asks for it
    pub async fn restore_presence(&self) {
        self.presence.lock().await.restore().await;
    }

    /// Broadcast a heartbeat every `interval`
    pub async fn start_heartbeat(self: Arc<Self>, interval: Duration) {
        let server = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                server.send_heartbeat();
            }
        });
        self.tasks.lock().await.push(handle);
    }

    async fn admit(self: Arc<Self>, stream: UnixStream) {
        let client_count = *self.client_count.read().await;
        if client_count >= MAX_CLIENTS {
            warn!("Maximum IPC clients reached ({}), rejecting connection", MAX_CLIENTS);
            return;
        }

        *self.client_count.write().await += 1;
        info!("UI client connected (total: {})", client_count + 1);

        tokio::spawn(async move {
            let (requests, result) = self.clone().handle_client(stream).await;
            if let Err(e) = result {
                debug!("Client handler ended: {:#}", e);
            }
            let remaining = {
                let mut count = self.client_count.write().await;
                *count -= 1;
                *count
            };
            info!("UI client disconnected (remaining: {})", remaining);
            // A connection that never sent a request was not a window
            if remaining == 0 && requests > 0 {
                self.on_all_windows_closed().await;
            }
        });
    }

    /// Forward host scheduler fires to every client
    fn spawn_fired_forwarder(self: Arc<Self>) -> JoinHandle<()> {
        let mut fired_rx = self.scheduler.subscribe();
        tokio::spawn(async move {
            loop {
                match fired_rx.recv().await {
                    Ok(fired) => {
                        debug!("Forwarding reminder-fired {}", fired.id);
                        self.broadcast(HostEvent::ReminderFired { id: fired.id });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Fired forwarder lagged behind by {} events", n);
                    }
                }
            }
        })
    }

    /// Handle a connected client; returns how many requests it sent
    async fn handle_client(self: Arc<Self>, stream: UnixStream) -> (usize, Result<()>) {
        let (mut reader, mut writer) = stream.into_split();

        let mut event_rx = self.event_tx.subscribe();
        let (response_tx, mut response_rx) = mpsc::channel::<HostEvent>(RESPONSE_CHANNEL_CAPACITY);

        // Writer task: broadcasts plus this client's own responses
        let mut write_handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    response = response_rx.recv() => match response {
                        Some(event) => event,
                        None => break,
                    },
                    broadcast = event_rx.recv() => match broadcast {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Client lagged behind by {} events", n);
                            continue;
                        }
                    },
                };
                match encode_message(&event) {
                    Ok(data) => {
                        if let Err(e) = writer.write_all(&data).await {
                            debug!("Failed to write to client: {}", e);
                            break;
                        }
                        if let Err(e) = writer.flush().await {
                            debug!("Failed to flush to client: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to encode event: {}", e);
                    }
                }
            }
        });

        let mut requests = 0usize;
        let result = loop {
            let frame = match read_frame(&mut reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let request = match serde_json::from_slice::<HostRequest>(&frame) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Failed to parse request from client: {}", e);
                    continue;
                }
            };

            requests += 1;
            debug!("Processing {} request", request.name());
            let request_id = request.request_id().map(str::to_string);
            let response = self.process_request(request).await;

            if let (Some(request_id), Some(response)) = (request_id, response) {
                let event = HostEvent::Response {
                    request_id,
                    response,
                };
                if response_tx.send(event).await.is_err() {
                    break Ok(());
                }
            }
        };

        // Let queued responses drain before tearing the writer down
        drop(response_tx);
        if tokio::time::timeout(Duration::from_millis(200), &mut write_handle)
            .await
            .is_err()
        {
            write_handle.abort();
        }
        (requests, result)
    }

    /// Process a single UI request and produce its response
    pub async fn process_request(&self, request: HostRequest) -> Option<HostResponse> {
        if self.is_shutting_down() && request.request_id().is_some() {
            debug!("Refusing {} request during shutdown", request.name());
            return Some(HostResponse::Error {
                message: "host is shutting down".to_string(),
            });
        }

        let response = match request {
            HostRequest::ShowNotification { title, body, .. } => HostResponse::Notified {
                success: self.dispatcher.attempt_notify(&title, &body).await,
            },
            HostRequest::PersistReminders { reminders, .. } => {
                info!("Persisting {} reminders from UI", reminders.len());
                HostResponse::Ack {
                    ok: self.scheduler.replace_all(reminders).await,
                }
            }
            HostRequest::GetPersistedReminders { .. } => HostResponse::Reminders {
                reminders: self.scheduler.get_all().await,
            },
            HostRequest::SetBackgroundPresenceEnabled { enabled, .. } => HostResponse::Ack {
                ok: self.presence.lock().await.set_enabled(enabled).await,
            },
            HostRequest::GetBackgroundPresenceEnabled { .. } => HostResponse::BackgroundPresence {
                enabled: self.presence.lock().await.enabled().await,
            },
            HostRequest::SaveBackup { snapshot, .. } => {
                HostResponse::BackupSaved(self.backups.save(&snapshot))
            }
            HostRequest::ListBackups { .. } => HostResponse::Backups {
                backups: self.backups.list(),
            },
            HostRequest::ReadBackup { name, .. } => {
                HostResponse::BackupContent(self.backups.read(&name))
            }
            HostRequest::DeleteBackup { name, .. } => {
                HostResponse::BackupDeleted(self.backups.delete(&name))
            }
            HostRequest::DeleteAllBackups { .. } => {
                HostResponse::BackupDeleted(self.backups.delete_all())
            }
            HostRequest::WindowClosing { .. } => HostResponse::CloseDecision {
                decision: self.presence.lock().await.on_window_close().await,
            },
            HostRequest::Quit => {
                self.presence.lock().await.quit();
                self.request_shutdown();
                return None;
            }
            HostRequest::Pong { timestamp } => {
                debug!("Received Pong with timestamp {}", timestamp);
                return None;
            }
        };
        Some(response)
    }

    async fn on_all_windows_closed(&self) {
        if self.presence.lock().await.on_all_windows_closed().await {
            info!("All windows closed, terminating host");
            self.request_shutdown();
        } else {
            info!("All windows closed, staying resident");
        }
    }

    /// Broadcast an event to all connected UI clients
    pub fn broadcast(&self, event: HostEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Get connected client count
    pub async fn client_count(&self) -> usize {
        *self.client_count.read().await
    }

    /// Send a heartbeat to all clients
    pub fn send_heartbeat(&self) {
        let timestamp = chrono::Utc::now().timestamp();
        self.broadcast(HostEvent::Heartbeat { timestamp });
    }

    /// Ask the host to exit; `wait_for_shutdown` returns afterwards
    pub fn request_shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            self.shutdown.notify_one();
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown.notified().await;
    }

    /// Tell clients, stop timers, remove the resident marker and the socket
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.broadcast(HostEvent::ShuttingDown);
        // Give writer tasks a moment to deliver the notice
        tokio::time::sleep(Duration::from_millis(50)).await;

        self.scheduler.cancel_all().await;
        self.presence.lock().await.shutdown();

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!("Failed removing socket {}: {}", self.socket_path.display(), e);
            }
        }
        info!("IPC server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::notifications::dispatcher::testing::{chain, RecordingProvider};
    use crate::features::presence::{CloseDecision, PresenceAffordance};
    use crate::features::reminders::{HostStore, MemoryBackend, Reminder};
    use crate::ipc::protocol::new_request_id;

    struct NoAffordance;

    impl PresenceAffordance for NoAffordance {
        fn create(&mut self) -> Result<()> {
            Ok(())
        }

        fn destroy(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn server(dir: &Path, provider: &Arc<RecordingProvider>) -> IpcServer {
        let store = Arc::new(Mutex::new(HostStore::load(Box::new(MemoryBackend::new()))));
        let dispatcher = chain(&[provider]);
        let scheduler = HostScheduler::new(store.clone(), dispatcher.clone());
        IpcServer::new(
            dir.join("test.sock"),
            scheduler,
            BackgroundPresence::new(store, Box::new(NoAffordance)),
            BackupStore::new(dir.join("backups")),
            dispatcher,
        )
    }

    #[tokio::test]
    async fn test_persist_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let server = server(dir.path(), &provider);

        let reminder = Reminder::new("Call doctor", "", chrono::Utc::now() + chrono::Duration::hours(1));
        let ack = server
            .process_request(HostRequest::PersistReminders {
                request_id: new_request_id(),
                reminders: vec![reminder.clone()],
            })
            .await;
        assert_eq!(ack, Some(HostResponse::Ack { ok: true }));

        let got = server
            .process_request(HostRequest::GetPersistedReminders {
                request_id: new_request_id(),
            })
            .await;
        assert_eq!(
            got,
            Some(HostResponse::Reminders {
                reminders: vec![reminder]
            })
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_show_notification_uses_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", false);
        let server = server(dir.path(), &provider);

        let response = server
            .process_request(HostRequest::ShowNotification {
                request_id: new_request_id(),
                title: "t".to_string(),
                body: "b".to_string(),
            })
            .await;
        assert_eq!(response, Some(HostResponse::Notified { success: false }));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_window_close_follows_presence() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let server = server(dir.path(), &provider);

        let close = HostRequest::WindowClosing {
            request_id: new_request_id(),
        };
        assert_eq!(
            server.process_request(close.clone()).await,
            Some(HostResponse::CloseDecision {
                decision: CloseDecision::Close
            })
        );

        server
            .process_request(HostRequest::SetBackgroundPresenceEnabled {
                request_id: new_request_id(),
                enabled: true,
            })
            .await;
        assert_eq!(
            server.process_request(close).await,
            Some(HostResponse::CloseDecision {
                decision: CloseDecision::Hide
            })
        );
    }

    #[tokio::test]
    async fn test_quit_requests_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let server = server(dir.path(), &provider);

        assert!(server.process_request(HostRequest::Quit).await.is_none());
        assert!(server.is_shutting_down());
        // The stored permit lets a late waiter return immediately
        tokio::time::timeout(Duration::from_secs(1), server.wait_for_shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_requests_after_quit_get_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let server = server(dir.path(), &provider);

        server.process_request(HostRequest::Quit).await;
        let response = server
            .process_request(HostRequest::PersistReminders {
                request_id: new_request_id(),
                reminders: Vec::new(),
            })
            .await;
        assert_eq!(
            response,
            Some(HostResponse::Error {
                message: "host is shutting down".to_string()
            })
        );
        assert!(server.process_request(HostRequest::Pong { timestamp: 1 }).await.is_none());
    }

    #[tokio::test]
    async fn test_start_refuses_a_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let first = Arc::new(server(dir.path(), &provider));
        first.clone().start().await.unwrap();

        let second = Arc::new(server(dir.path(), &provider));
        let err = second.clone().start().await.unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert!(first.socket_path().exists());

        // The liveness check is not a window, so the first host stays up
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!first.is_shutting_down());
        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_replaces_a_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let path = dir.path().join("test.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let server = Arc::new(server(dir.path(), &provider));
        server.clone().start().await.unwrap();
        assert!(UnixStream::connect(&path).await.is_ok());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_backup_read_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordingProvider::new("native", true);
        let server = server(dir.path(), &provider);

        match server
            .process_request(HostRequest::ReadBackup {
                request_id: new_request_id(),
                name: "backup-missing.json".to_string(),
            })
            .await
        {
            Some(HostResponse::BackupContent(outcome)) => {
                assert!(!outcome.success);
                assert_eq!(outcome.error.as_deref(), Some("not found"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
