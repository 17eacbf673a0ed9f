//! # Core Module
//!
//! Configuration and caller identity shared by every image engine.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod config;
pub mod identity;

// Re-export commonly used items
pub use config::{AppConfig, LoggingConfig, Section};
pub use identity::Identity;
