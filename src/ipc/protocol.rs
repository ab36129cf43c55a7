//! # IPC Protocol
//!
//! Message types for UI <-> host communication over a Unix socket.
//!
//! Uses length-prefixed JSON framing:
//! - 4 bytes: message length (big-endian u32)
//! - N bytes: JSON payload

use crate::features::backups::{BackupInfo, BackupOutcome};
use crate::features::presence::CloseDecision;
use crate::features::reminders::Reminder;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame payload
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

// ============================================================================
// Host -> UI Events
// ============================================================================

/// Events sent from the host to connected UI clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    /// Answer to one request, sent only to the client that asked
    Response {
        request_id: String,
        response: HostResponse,
    },
    /// The host fired a reminder; UIs mark it fired without notifying
    ReminderFired { id: String },
    /// Keep-alive
    Heartbeat { timestamp: i64 },
    /// Host is about to exit
    ShuttingDown,
}

/// Payload of a [`HostEvent::Response`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HostResponse {
    Notified { success: bool },
    Ack { ok: bool },
    Reminders { reminders: Vec<Reminder> },
    BackgroundPresence { enabled: bool },
    BackupSaved(BackupOutcome),
    Backups { backups: Vec<BackupInfo> },
    BackupContent(BackupOutcome),
    BackupDeleted(BackupOutcome),
    CloseDecision { decision: CloseDecision },
    Error { message: String },
}

// ============================================================================
// UI -> Host Requests
// ============================================================================

/// Requests sent from a UI client to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostRequest {
    ShowNotification {
        request_id: String,
        title: String,
        body: String,
    },
    PersistReminders {
        request_id: String,
        reminders: Vec<Reminder>,
    },
    GetPersistedReminders {
        request_id: String,
    },
    SetBackgroundPresenceEnabled {
        request_id: String,
        enabled: bool,
    },
    GetBackgroundPresenceEnabled {
        request_id: String,
    },
    SaveBackup {
        request_id: String,
        snapshot: serde_json::Value,
    },
    ListBackups {
        request_id: String,
    },
    ReadBackup {
        request_id: String,
        name: String,
    },
    DeleteBackup {
        request_id: String,
        name: String,
    },
    DeleteAllBackups {
        request_id: String,
    },
    /// The user closed the window; the host answers with a close decision
    WindowClosing {
        request_id: String,
    },
    /// Terminate the host unconditionally
    Quit,
    Pong {
        timestamp: i64,
    },
}

impl HostRequest {
    /// Correlation id, absent for fire-and-forget requests
    pub fn request_id(&self) -> Option<&str> {
        match self {
            HostRequest::ShowNotification { request_id, .. }
            | HostRequest::PersistReminders { request_id, .. }
            | HostRequest::GetPersistedReminders { request_id }
            | HostRequest::SetBackgroundPresenceEnabled { request_id, .. }
            | HostRequest::GetBackgroundPresenceEnabled { request_id }
            | HostRequest::SaveBackup { request_id, .. }
            | HostRequest::ListBackups { request_id }
            | HostRequest::ReadBackup { request_id, .. }
            | HostRequest::DeleteBackup { request_id, .. }
            | HostRequest::DeleteAllBackups { request_id }
            | HostRequest::WindowClosing { request_id } => Some(request_id),
            HostRequest::Quit | HostRequest::Pong { .. } => None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            HostRequest::ShowNotification { .. } => "show-notification",
            HostRequest::PersistReminders { .. } => "persist-reminders",
            HostRequest::GetPersistedReminders { .. } => "get-persisted-reminders",
            HostRequest::SetBackgroundPresenceEnabled { .. } => "set-bg-enabled",
            HostRequest::GetBackgroundPresenceEnabled { .. } => "get-bg-enabled",
            HostRequest::SaveBackup { .. } => "save-backup",
            HostRequest::ListBackups { .. } => "list-backups",
            HostRequest::ReadBackup { .. } => "read-backup",
            HostRequest::DeleteBackup { .. } => "delete-backup",
            HostRequest::DeleteAllBackups { .. } => "delete-all-backups",
            HostRequest::WindowClosing { .. } => "window-closing",
            HostRequest::Quit => "quit",
            HostRequest::Pong { .. } => "pong",
        }
    }
}

/// Fresh request correlation id
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Framing
// ============================================================================

/// Encode a message with length prefix
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes", json.len()));
    }
    let len = json.len() as u32;
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Read one frame payload. `Ok(None)` means the peer closed the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes", len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Write a framed message to a writer
pub async fn write_message<T: Serialize, W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &T,
) -> Result<()> {
    let encoded = encode_message(msg)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let event = HostEvent::Heartbeat { timestamp: 12345 };
        let mut buf = Vec::new();
        write_message(&mut buf, &event).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        match serde_json::from_slice::<HostEvent>(&frame).unwrap() {
            HostEvent::Heartbeat { timestamp } => assert_eq!(timestamp, 12345),
            other => panic!("Wrong event type: {other:?}"),
        }
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut raw = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
        raw.extend_from_slice(b"{}");
        let mut cursor = Cursor::new(raw);
        assert!(read_frame(&mut cursor).await.is_err());
    }

    #[test]
    fn test_request_serialization() {
        let req = HostRequest::ReadBackup {
            request_id: "test-123".to_string(),
            name: "backup-x.json".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"ReadBackup\""));
        assert!(json.contains("test-123"));
        assert_eq!(req.request_id(), Some("test-123"));
        assert_eq!(HostRequest::Quit.request_id(), None);
    }

    #[test]
    fn test_backup_response_flattens_outcome() {
        let response = HostResponse::BackupContent(BackupOutcome::failed("not found"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "BackupContent");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "not found");

        let back: HostResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_close_decision_wire_form() {
        let event = HostEvent::Response {
            request_id: "r".to_string(),
            response: HostResponse::CloseDecision {
                decision: CloseDecision::Hide,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Response");
        assert_eq!(json["response"]["kind"], "CloseDecision");
        assert_eq!(json["response"]["decision"], "Hide");
    }
}
