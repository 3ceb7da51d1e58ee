//! Configuration and error types shared by every Pulsegrid module.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, DemoConfig, LogLevel, LoggingConfig, MonitoringConfig};
pub use error::{MonitorError, Result};
