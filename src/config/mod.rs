//! # Configuration
//!
//! Process-level settings. Everything the pipeline needs to know about the
//! target repository, credentials and the HTTP surface is loaded once at
//! startup and shared read-only.

pub mod controller;

pub use controller::{ConfigError, ControllerConfig, LogFormat};
