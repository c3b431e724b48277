//! Shared utilities for stockeval
//!
//! This crate provides the ambient pieces used across the workspace:
//! tracing subscriber setup and the telemetry toggles read at startup.

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::init_tracing;
