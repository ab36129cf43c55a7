//! Notification provider that asks the host to show the notification.

use crate::features::notifications::NotificationProvider;
use crate::ipc::client::IpcHandle;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// First link of the UI dispatcher chain while connected to a host
pub struct HostBridgeNotifier {
    handle: IpcHandle,
}

impl HostBridgeNotifier {
    pub fn new(handle: IpcHandle) -> Self {
        HostBridgeNotifier { handle }
    }
}

#[async_trait]
impl NotificationProvider for HostBridgeNotifier {
    fn name(&self) -> &str {
        "host"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        if !self.handle.is_connected().await {
            return Err(anyhow!("not connected to host"));
        }
        if self.handle.show_notification(title, body).await? {
            Ok(())
        } else {
            Err(anyhow!("host could not display the notification"))
        }
    }
}
