//! # IPC Client
//!
//! Unix socket client for the UI to talk to the host.

use crate::features::backups::{BackupInfo, BackupOutcome};
use crate::features::presence::CloseDecision;
use crate::features::reminders::Reminder;
use crate::ipc::protocol::{
    encode_message, new_request_id, read_frame, HostEvent, HostRequest, HostResponse,
};
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tokio::time::{timeout, Duration};

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `invoke` waits for the matching response
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<HostResponse>>>>;

/// Cloneable request side of a connection
#[derive(Clone)]
pub struct IpcHandle {
    command_tx: mpsc::Sender<HostRequest>,
    pending: PendingMap,
    connected: Arc<RwLock<bool>>,
    closing: Arc<Notify>,
}

/// IPC client for the UI
pub struct IpcClient {
    handle: IpcHandle,
    /// Pushed events (responses are routed to their callers instead)
    event_rx: mpsc::Receiver<HostEvent>,
}

impl IpcClient {
    /// Connect to the host's IPC server
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        info!("Connecting to IPC server at {}", socket_path.display());

        let stream = timeout(CONNECT_TIMEOUT, UnixStream::connect(socket_path))
            .await
            .map_err(|_| anyhow!("Connection timeout"))?
            .map_err(|e| anyhow!("Failed to connect: {}", e))?;

        info!("Connected to IPC server");

        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let handle = IpcHandle {
            command_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(RwLock::new(true)),
            closing: Arc::new(Notify::new()),
        };

        let loop_handle = handle.clone();
        tokio::spawn(async move {
            Self::connection_loop(stream, event_tx, command_rx, loop_handle).await;
        });

        Ok(IpcClient { handle, event_rx })
    }

    /// Main connection loop - routes responses, forwards events, writes requests
    async fn connection_loop(
        stream: UnixStream,
        event_tx: mpsc::Sender<HostEvent>,
        mut command_rx: mpsc::Receiver<HostRequest>,
        handle: IpcHandle,
    ) {
        let (mut reader, mut writer) = stream.into_split();

        // Spawn request writer task
        let write_connected = handle.connected.clone();
        let write_handle = tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                match encode_message(&cmd) {
                    Ok(data) => {
                        if let Err(e) = writer.write_all(&data).await {
                            error!("Failed to write request: {}", e);
                            *write_connected.write().await = false;
                            break;
                        }
                        if let Err(e) = writer.flush().await {
                            error!("Failed to flush request: {}", e);
                            *write_connected.write().await = false;
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to encode request: {}", e);
                    }
                }
            }
        });

        // Event reader loop
        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut reader) => frame,
                _ = handle.closing.notified() => {
                    debug!("Disconnect requested");
                    break;
                }
            };
            let buf = match frame {
                Ok(Some(buf)) => buf,
                Ok(None) => break,
                Err(e) => {
                    error!("Read error: {:#}", e);
                    break;
                }
            };

            let event = match serde_json::from_slice::<HostEvent>(&buf) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Failed to parse event: {}", e);
                    continue;
                }
            };

            match event {
                HostEvent::Response {
                    request_id,
                    response,
                } => match handle.pending.lock().await.remove(&request_id) {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => debug!("Dropping response for unknown request {}", request_id),
                },
                other => {
                    if let HostEvent::Heartbeat { timestamp } = &other {
                        debug!("Received heartbeat: {}", timestamp);
                        let _ = handle
                            .command_tx
                            .try_send(HostRequest::Pong { timestamp: *timestamp });
                    }
                    if event_tx.send(other).await.is_err() {
                        debug!("Event receiver closed");
                        break;
                    }
                }
            }
        }

        *handle.connected.write().await = false;
        // Dropping the waiters fails every in-flight invoke
        handle.pending.lock().await.clear();
        write_handle.abort();
        info!("IPC connection closed");
    }

    pub fn handle(&self) -> IpcHandle {
        self.handle.clone()
    }

    /// Separate the request handle from the event stream
    pub fn split(self) -> (IpcHandle, mpsc::Receiver<HostEvent>) {
        (self.handle, self.event_rx)
    }
}

impl IpcHandle {
    /// Send a request without waiting for an answer
    pub async fn send(&self, cmd: HostRequest) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|e| anyhow!("Failed to send request: {}", e))
    }

    /// Send a request and wait for its correlated response
    pub async fn invoke(&self, request: HostRequest) -> Result<HostResponse> {
        let request_id = request
            .request_id()
            .ok_or_else(|| anyhow!("{} expects no response", request.name()))?
            .to_string();
        let name = request.name();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(e) = self.send(request).await {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(HostResponse::Error { message })) => Err(anyhow!("{} failed: {}", name, message)),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(anyhow!("Connection closed while waiting for {}", name)),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(anyhow!("Timed out waiting for {}", name))
            }
        }
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Close the connection; the host sees this window go away
    pub fn disconnect(&self) {
        self.closing.notify_one();
    }

    pub async fn show_notification(&self, title: &str, body: &str) -> Result<bool> {
        match self
            .invoke(HostRequest::ShowNotification {
                request_id: new_request_id(),
                title: title.to_string(),
                body: body.to_string(),
            })
            .await?
        {
            HostResponse::Notified { success } => Ok(success),
            other => Err(unexpected(other)),
        }
    }

    pub async fn persist_reminders(&self, reminders: Vec<Reminder>) -> Result<bool> {
        match self
            .invoke(HostRequest::PersistReminders {
                request_id: new_request_id(),
                reminders,
            })
            .await?
        {
            HostResponse::Ack { ok } => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_persisted_reminders(&self) -> Result<Vec<Reminder>> {
        match self
            .invoke(HostRequest::GetPersistedReminders {
                request_id: new_request_id(),
            })
            .await?
        {
            HostResponse::Reminders { reminders } => Ok(reminders),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_background_presence_enabled(&self, enabled: bool) -> Result<bool> {
        match self
            .invoke(HostRequest::SetBackgroundPresenceEnabled {
                request_id: new_request_id(),
                enabled,
            })
            .await?
        {
            HostResponse::Ack { ok } => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_background_presence_enabled(&self) -> Result<bool> {
        match self
            .invoke(HostRequest::GetBackgroundPresenceEnabled {
                request_id: new_request_id(),
            })
            .await?
        {
            HostResponse::BackgroundPresence { enabled } => Ok(enabled),
            other => Err(unexpected(other)),
        }
    }

    pub async fn save_backup(&self, snapshot: serde_json::Value) -> Result<BackupOutcome> {
        match self
            .invoke(HostRequest::SaveBackup {
                request_id: new_request_id(),
                snapshot,
            })
            .await?
        {
            HostResponse::BackupSaved(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        match self
            .invoke(HostRequest::ListBackups {
                request_id: new_request_id(),
            })
            .await?
        {
            HostResponse::Backups { backups } => Ok(backups),
            other => Err(unexpected(other)),
        }
    }

    pub async fn read_backup(&self, name: &str) -> Result<BackupOutcome> {
        match self
            .invoke(HostRequest::ReadBackup {
                request_id: new_request_id(),
                name: name.to_string(),
            })
            .await?
        {
            HostResponse::BackupContent(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    pub async fn delete_backup(&self, name: &str) -> Result<BackupOutcome> {
        match self
            .invoke(HostRequest::DeleteBackup {
                request_id: new_request_id(),
                name: name.to_string(),
            })
            .await?
        {
            HostResponse::BackupDeleted(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    pub async fn delete_all_backups(&self) -> Result<BackupOutcome> {
        match self
            .invoke(HostRequest::DeleteAllBackups {
                request_id: new_request_id(),
            })
            .await?
        {
            HostResponse::BackupDeleted(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the host whether the closing window should hide or close
    pub async fn window_closing(&self) -> Result<CloseDecision> {
        match self
            .invoke(HostRequest::WindowClosing {
                request_id: new_request_id(),
            })
            .await?
        {
            HostResponse::CloseDecision { decision } => Ok(decision),
            other => Err(unexpected(other)),
        }
    }

    /// Force the host to terminate
    pub async fn quit(&self) -> Result<()> {
        self.send(HostRequest::Quit).await
    }
}

fn unexpected(response: HostResponse) -> anyhow::Error {
    anyhow!("Unexpected response: {:?}", response)
}

/// Try to connect with retries
pub async fn connect_with_retry(
    socket_path: &Path,
    max_attempts: u32,
    delay: Duration,
) -> Result<IpcClient> {
    let mut attempt = 1;
    loop {
        match IpcClient::connect(socket_path).await {
            Ok(client) => return Ok(client),
            Err(e) if attempt < max_attempts => {
                warn!(
                    "Connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(anyhow!(
                    "Failed to connect after {} attempts: {}",
                    max_attempts,
                    e
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");
        let err = connect_with_retry(&path, 2, Duration::from_millis(10))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn test_invoke_rejects_fire_and_forget() {
        let (command_tx, _command_rx) = mpsc::channel(1);
        let handle = IpcHandle {
            command_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(RwLock::new(true)),
            closing: Arc::new(Notify::new()),
        };
        assert!(handle.invoke(HostRequest::Quit).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_times_out_without_response() {
        let (command_tx, mut command_rx) = mpsc::channel(1);
        let handle = IpcHandle {
            command_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(RwLock::new(true)),
            closing: Arc::new(Notify::new()),
        };
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.get_background_presence_enabled().await }
        });

        assert!(command_rx.recv().await.is_some());
        let result = waiter.await.unwrap();
        assert!(result.unwrap_err().to_string().contains("Timed out"));
        assert!(handle.pending.lock().await.is_empty());
    }
}
