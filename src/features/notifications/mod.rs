//! # Feature: Notifications
//!
//! Surfaces reminders as native OS notifications through an ordered list of
//! providers. Each provider is independently failable; the dispatcher reports
//! total failure so callers can fall back to an in-app alert.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Command-line fallback (osascript / notify-send)
//! - 1.0.0: Provider chain with desktop notifications

pub mod dispatcher;
pub mod providers;

pub use dispatcher::{NotificationDispatcher, NotificationProvider};
pub use providers::{native_dispatcher, CommandNotifier, DesktopNotifier};
