//! # Core Module
//!
//! Configuration shared by the host daemon and the terminal UI.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod config;

pub use config::Config;
