//! # Host
//!
//! Wires the store, host scheduler, background presence and IPC server
//! together and runs them until a shutdown trigger. Only one host may own
//! a socket (and so the store) at a time.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

use crate::core::Config;
use crate::features::backups::BackupStore;
use crate::features::notifications::{native_dispatcher, NotificationDispatcher};
use crate::features::presence::{BackgroundPresence, ResidentMarker};
use crate::features::reminders::{HostScheduler, HostStore, JsonFileBackend};
use crate::ipc::IpcServer;
use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Load state, claim the socket, then arm timers and restore presence.
///
/// A second host on the same socket fails before it schedules anything.
pub async fn start(config: &Config, dispatcher: NotificationDispatcher) -> Result<Arc<IpcServer>> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let backend = JsonFileBackend::new(config.store_file());
    let store = Arc::new(Mutex::new(HostStore::load(Box::new(backend))));

    let scheduler = HostScheduler::new(store.clone(), dispatcher.clone());
    let presence =
        BackgroundPresence::new(store, Box::new(ResidentMarker::new(config.resident_marker())));

    let server = Arc::new(IpcServer::new(
        config.socket_path.clone(),
        scheduler.clone(),
        presence,
        BackupStore::new(config.backups_dir()),
        dispatcher,
    ));
    server.clone().start().await?;

    scheduler.start().await;
    server.restore_presence().await;
    server
        .clone()
        .start_heartbeat(Duration::from_secs(config.heartbeat_secs))
        .await;
    Ok(server)
}

/// Run the host until Ctrl-C, a quit request or the last window closing
pub async fn run(config: Config) -> Result<()> {
    let server = start(&config, native_dispatcher()).await?;
    info!("Host ready (data dir {})", config.data_dir.display());

    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!("Failed listening for Ctrl-C: {}", e),
        },
        _ = server.wait_for_shutdown() => {}
    }

    server.shutdown().await;
    Ok(())
}
