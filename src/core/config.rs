//! Configuration management for Pulsegrid.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable and CLI overrides (applied by `cli`)
//! - Validation and defaults

use crate::core::{MonitorError, Result};
use crate::metrics::HistoryPeriod;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for Pulsegrid
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Liveness and query configuration
    pub monitoring: MonitoringConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Synthetic reporter configuration
    pub demo: DemoConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Liveness and query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// How long an instance may stay silent before it is reported as stale
    #[serde(with = "humantime_serde")]
    pub endpoint_uptime_grace_period: Duration,
    /// How long a silent instance is kept before the sweeper forgets it
    #[serde(with = "humantime_serde")]
    pub expired_instance_retention: Duration,
    /// How often the sweeper runs
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// History window used when a query does not name one
    pub default_history_minutes: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Synthetic reporter configuration for the headless demo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Run synthetic endpoints inside the process
    pub enabled: bool,
    /// Number of simulated endpoints
    pub endpoints: usize,
    /// Instances per simulated endpoint
    pub instances_per_endpoint: usize,
    /// Delay between two reports of one instance
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        MonitoringConfig {
            endpoint_uptime_grace_period: Duration::from_secs(40),
            expired_instance_retention: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(30),
            default_history_minutes: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            enabled: false,
            endpoints: 3,
            instances_per_endpoint: 2,
            report_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let monitoring = &self.monitoring;

        if monitoring.endpoint_uptime_grace_period.is_zero() {
            return Err(MonitorError::config(
                "endpoint_uptime_grace_period must be greater than 0",
            ));
        }

        if monitoring.sweep_interval.is_zero() {
            return Err(MonitorError::config("sweep_interval must be greater than 0"));
        }

        if monitoring.expired_instance_retention < monitoring.endpoint_uptime_grace_period {
            return Err(MonitorError::config(format!(
                "expired_instance_retention ({:?}) must not be shorter than \
                 endpoint_uptime_grace_period ({:?})",
                monitoring.expired_instance_retention, monitoring.endpoint_uptime_grace_period
            )));
        }

        HistoryPeriod::from_minutes(monitoring.default_history_minutes)?;

        if self.demo.enabled {
            if self.demo.endpoints == 0 || self.demo.instances_per_endpoint == 0 {
                return Err(MonitorError::config(
                    "demo endpoints and instances_per_endpoint must be greater than 0",
                ));
            }
            if self.demo.report_interval.is_zero() {
                return Err(MonitorError::config("demo report_interval must be greater than 0"));
            }
        }

        Ok(())
    }

    /// The history window used when a query does not name one.
    pub fn default_history_period(&self) -> Result<HistoryPeriod> {
        HistoryPeriod::from_minutes(self.monitoring.default_history_minutes)
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MonitorError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the staleness grace period
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config.monitoring.endpoint_uptime_grace_period = grace;
        self
    }

    /// Set how long silent instances are retained
    pub fn expired_instance_retention(mut self, retention: Duration) -> Self {
        self.config.monitoring.expired_instance_retention = retention;
        self
    }

    /// Set the sweeper interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.monitoring.sweep_interval = interval;
        self
    }

    /// Set the default history window
    pub fn default_history_minutes(mut self, minutes: u32) -> Self {
        self.config.monitoring.default_history_minutes = minutes;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable synthetic reporters
    pub fn demo(mut self, enable: bool) -> Self {
        self.config.demo.enabled = enable;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_history_period().unwrap().minutes(), 1);
    }

    #[test]
    fn test_zero_grace_period_rejected() {
        let mut config = Config::default();
        config.monitoring.endpoint_uptime_grace_period = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retention_shorter_than_grace_rejected() {
        let result = ConfigBuilder::new()
            .grace_period(Duration::from_secs(120))
            .expired_instance_retention(Duration::from_secs(60))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_default_history_rejected() {
        let result = ConfigBuilder::new().default_history_minutes(7).build();
        assert!(matches!(
            result,
            Err(MonitorError::UnsupportedHistoryPeriod { minutes: 7 })
        ));
    }

    #[test]
    fn test_demo_needs_endpoints() {
        let mut config = Config::default();
        config.demo.enabled = true;
        config.demo.endpoints = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
monitoring:
  endpoint_uptime_grace_period: 1m
  expired_instance_retention: 2h
  default_history_minutes: 15
logging:
  level: debug
demo:
  enabled: true
  endpoints: 5
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

        assert_eq!(
            config.monitoring.endpoint_uptime_grace_period,
            Duration::from_secs(60)
        );
        assert_eq!(
            config.monitoring.expired_instance_retention,
            Duration::from_secs(7200)
        );
        assert_eq!(config.monitoring.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.monitoring.default_history_minutes, 15);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.demo.enabled);
        assert_eq!(config.demo.endpoints, 5);
        assert_eq!(config.demo.instances_per_endpoint, 2);
    }
}
