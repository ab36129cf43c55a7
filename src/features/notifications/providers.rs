//! Platform notification providers.

use super::dispatcher::{NotificationDispatcher, NotificationProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Application name reported to the desktop notification service
pub const APP_NAME: &str = "Nodeboard";

/// Desktop notification through the platform notification service
pub struct DesktopNotifier;

#[async_trait]
impl NotificationProvider for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let title = title.to_string();
        let body = body.to_string();
        // notify-rust talks to D-Bus / NSUserNotification synchronously
        tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .appname(APP_NAME)
                .show()
                .map(|_| ())
                .map_err(|e| anyhow!("desktop notification failed: {}", e))
        })
        .await
        .map_err(|e| anyhow!("desktop notification task failed: {}", e))?
    }
}

/// Command-line fallback: `osascript` on macOS, `notify-send` on Linux
pub struct CommandNotifier;

impl CommandNotifier {
    /// Program and arguments for this platform, if any
    pub fn command_for(title: &str, body: &str) -> Option<(&'static str, Vec<String>)> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {}",
                applescript_string(body),
                applescript_string(title)
            );
            Some(("/usr/bin/osascript", vec!["-e".to_string(), script]))
        } else if cfg!(target_os = "linux") {
            Some(("notify-send", vec![title.to_string(), body.to_string()]))
        } else {
            None
        }
    }
}

#[async_trait]
impl NotificationProvider for CommandNotifier {
    fn name(&self) -> &str {
        "command"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let (program, args) = Self::command_for(title, body)
            .ok_or_else(|| anyhow!("no notification command for {}", std::env::consts::OS))?;

        let output = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| anyhow!("failed to run {}: {}", program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

/// Quote a string as an AppleScript literal
fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// The host's chain: desktop notification, then the command-line fallback
pub fn native_dispatcher() -> NotificationDispatcher {
    NotificationDispatcher::default()
        .with_provider(Arc::new(DesktopNotifier))
        .with_provider(Arc::new(CommandNotifier))
}
