//! # Configuration
//!
//! Environment-driven configuration shared by the host daemon and the TUI.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.0.0: Data dir, IPC socket, log level and heartbeat settings

use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Store file name inside the data directory
pub const STORE_FILE_NAME: &str = "nodeboard-store.json";

/// Backups directory name inside the data directory
pub const BACKUPS_DIR_NAME: &str = "backups";

/// Resident marker file name (background presence affordance)
pub const RESIDENT_MARKER_NAME: &str = "resident.json";

/// Socket file name used when no explicit socket path is configured
pub const DEFAULT_SOCKET_NAME: &str = "nodeboard.sock";

/// Default heartbeat interval for connected UI clients
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all persisted host state
    pub data_dir: PathBuf,
    /// Unix socket the host listens on
    pub socket_path: PathBuf,
    /// Default `env_logger` filter
    pub log_level: String,
    /// Seconds between heartbeat broadcasts
    pub heartbeat_secs: u64,
}

impl Config {
    /// Build configuration from environment variables (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var_os("NODEBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let socket_path = std::env::var_os("NODEBOARD_IPC_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(default_socket_path);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let heartbeat_secs = match std::env::var("NODEBOARD_HEARTBEAT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow!("Invalid NODEBOARD_HEARTBEAT_SECS '{}': {}", raw, e))?,
            Err(_) => DEFAULT_HEARTBEAT_SECS,
        };
        if heartbeat_secs == 0 {
            return Err(anyhow!("NODEBOARD_HEARTBEAT_SECS must be greater than zero"));
        }

        Ok(Config {
            data_dir,
            socket_path,
            log_level,
            heartbeat_secs,
        })
    }

    /// Configuration rooted at an explicit directory (socket inside it)
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Config {
            socket_path: data_dir.join(DEFAULT_SOCKET_NAME),
            data_dir,
            log_level: "info".to_string(),
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }

    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUPS_DIR_NAME)
    }

    pub fn resident_marker(&self) -> PathBuf {
        self.data_dir.join(RESIDENT_MARKER_NAME)
    }

    /// Log file for the TUI, which cannot log to the terminal it draws on
    pub fn tui_log_file(&self) -> PathBuf {
        self.data_dir.join("nodeboard-tui.log")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("nodeboard"))
        .unwrap_or_else(|| PathBuf::from("/tmp/nodeboard-data"))
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_SOCKET_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = Config::with_data_dir("/var/lib/nb");
        assert_eq!(config.store_file(), PathBuf::from("/var/lib/nb/nodeboard-store.json"));
        assert_eq!(config.backups_dir(), PathBuf::from("/var/lib/nb/backups"));
        assert_eq!(config.resident_marker(), PathBuf::from("/var/lib/nb/resident.json"));
        assert_eq!(config.socket_path, PathBuf::from("/var/lib/nb/nodeboard.sock"));
        assert_eq!(config.heartbeat_secs, DEFAULT_HEARTBEAT_SECS);
    }
}
