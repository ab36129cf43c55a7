//! # IPC Module
//!
//! Inter-process communication between the host and UI clients.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Correlated request/response calls and host bridge notifications
//! - 1.0.0: Initial IPC implementation with Unix socket protocol

pub mod bridge;
pub mod client;
pub mod protocol;
pub mod server;

pub use bridge::HostBridgeNotifier;
pub use client::{connect_with_retry, IpcClient, IpcHandle};
pub use protocol::{HostEvent, HostRequest, HostResponse};
pub use server::IpcServer;
