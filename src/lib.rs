// Core layer - shared configuration
pub mod core;

// Features layer - reminders, notifications, presence, backups
pub mod features;

// Host wiring - store, scheduler, presence and IPC server
pub mod host;

// IPC layer - communication between host and UI clients
pub mod ipc;

// TUI layer - terminal user interface (optional feature)
#[cfg(feature = "tui")]
pub mod tui;

pub use core::Config;

pub use features::backups::{BackupInfo, BackupOutcome, BackupStore};
pub use features::notifications::{NotificationDispatcher, NotificationProvider};
pub use features::presence::{BackgroundPresence, CloseDecision, PresenceState};
pub use features::reminders::{HostScheduler, HostStore, Reminder, UiScheduler};
