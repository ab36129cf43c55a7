//! # TUI Module
//!
//! Terminal board for reminders, backups and background presence.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Reminder board with local scheduling, backups and settings screens
//! - 1.0.0: Initial TUI implementation

pub mod app;
pub mod event;
pub mod ui;

pub use app::{App, Screen};
pub use event::{Event, EventHandler};
