//! # Feature: Reminders
//!
//! Time-based reminders scheduled in two places: the host scheduler, which
//! owns the persisted set and fires while no window is open, and the UI
//! scheduler, which fires locally for immediate feedback and pushes every
//! change back to the host.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Host/UI split, persisted store, fired-flag reconciliation
//! - 1.0.0: Initial in-memory scheduler

pub mod model;
pub mod scheduler;
pub mod store;
pub mod ui_scheduler;
pub mod when;

pub use model::Reminder;
pub use scheduler::{HostScheduler, ReminderFired, SharedStore};
pub use store::{HostStore, JsonFileBackend, MemoryBackend, StoreBackend, StoreRecord};
pub use ui_scheduler::{DueTimer, FireOutcome, UiScheduler};
