//! Command-line interface for Pulsegrid.
//!
//! Parses arguments, resolves the configuration, installs logging and runs
//! the engine headless until Ctrl-C.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, MonitorError, Result};
use crate::demo::DemoReporter;
use crate::engine::MonitoringEngine;
use crate::metrics::HistoryPeriod;
use crate::monitoring::InstanceSweeper;
use crate::query::{EndpointsQuery, MetricKind};
use crate::receiver::ReportReceiver;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How often the headless loop logs an endpoint digest
const DIGEST_INTERVAL: Duration = Duration::from_secs(10);

/// In-memory endpoint monitoring engine
#[derive(Parser, Debug)]
#[command(name = "pulsegrid")]
#[command(version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/pulsegrid/config.yaml)
    #[arg(short, long, env = "PULSEGRID_CONFIG")]
    pub config: Option<PathBuf>,

    /// How long an instance may stay silent before it is stale (e.g. 40s)
    #[arg(long, env = "PULSEGRID_GRACE_PERIOD", value_parser = parse_duration)]
    pub grace_period: Option<Duration>,

    /// How long silent instances are kept before they are forgotten (e.g. 1h)
    #[arg(long, env = "PULSEGRID_RETENTION", value_parser = parse_duration)]
    pub retention: Option<Duration>,

    /// History window in minutes for the periodic digest (1, 5, 10, 15, 30 or 60)
    #[arg(long, env = "PULSEGRID_HISTORY")]
    pub history: Option<u32>,

    /// Run synthetic endpoints inside the process
    #[arg(long, env = "PULSEGRID_DEMO")]
    pub demo: bool,

    /// Enable debug logging
    #[arg(short, long, env = "PULSEGRID_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,

    /// Show version information
    #[arg(short = 'V', long = "show-version")]
    pub version: bool,
}

fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            match dirs::config_dir().map(|d| d.join("pulsegrid").join("config.yaml")) {
                Some(path) if path.exists() => path,
                _ => return self.build_config_from_args(builder),
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
                debug!("Loaded configuration from: {:?}", config_path);
            },
            Err(e) if self.config.is_some() => {
                return Err(MonitorError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
            Err(_) => {
                debug!("No config file found at {:?}, using defaults", config_path);
            },
        }

        self.build_config_from_args(builder)
    }

    /// Apply argument overrides on top of `builder` and validate
    pub fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(grace) = self.grace_period {
            builder = builder.grace_period(grace);
        }
        if let Some(retention) = self.retention {
            builder = builder.expired_instance_retention(retention);
        }
        if let Some(minutes) = self.history {
            builder = builder.default_history_minutes(minutes);
        }
        if self.demo {
            builder = builder.demo(true);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging.
    ///
    /// `--debug` wins, then `RUST_LOG`, then `PULSEGRID_LOG_LEVEL`, then the
    /// configured level.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if self.debug {
            "debug".to_owned()
        } else {
            std::env::var("PULSEGRID_LOG_LEVEL")
                .unwrap_or_else(|_| config.logging.level.as_str().to_owned())
        };

        let filter = if self.debug {
            EnvFilter::new(&log_level)
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level))
        };

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MonitorError::logging(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the Pulsegrid application.
pub async fn execute(cli: Cli) -> Result<()> {
    if cli.version {
        println!("pulsegrid {}", env!("CARGO_PKG_VERSION"));
        println!("In-memory endpoint monitoring engine");
        return Ok(());
    }

    let config = cli.load_config().await?;

    if cli.check_config {
        let monitoring = &config.monitoring;
        println!("Configuration is valid!");
        println!("  Grace period: {:?}", monitoring.endpoint_uptime_grace_period);
        println!("  Instance retention: {:?}", monitoring.expired_instance_retention);
        println!("  Sweep interval: {:?}", monitoring.sweep_interval);
        println!("  Default history: {} minutes", monitoring.default_history_minutes);
        println!("  Demo reporters: {}", config.demo.enabled);
        return Ok(());
    }

    cli.init_logging(&config)?;
    run_headless(config).await
}

async fn run_headless(config: Config) -> Result<()> {
    let period = config.default_history_period()?;
    let engine = Arc::new(MonitoringEngine::new(&config.monitoring));
    let query = EndpointsQuery::new(Arc::clone(&engine));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = vec![tokio::spawn(
        InstanceSweeper::new(
            Arc::clone(&engine),
            config.monitoring.sweep_interval,
            config.monitoring.expired_instance_retention,
        )
        .run(shutdown_rx.clone()),
    )];

    if config.demo.enabled {
        let receiver = Arc::new(ReportReceiver::new(Arc::clone(&engine)));
        let reporter = DemoReporter::new(receiver, &config.demo);
        tasks.push(tokio::spawn(reporter.run(shutdown_rx)));
    }

    info!(history_minutes = period.minutes(), "Pulsegrid running in headless mode");

    let mut digest = tokio::time::interval(DIGEST_INTERVAL);
    loop {
        tokio::select! {
            _ = digest.tick() => log_digest(&query, period),
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received shutdown signal, stopping...");
                break;
            }
        }
    }

    if shutdown_tx.send(true).is_err() {
        debug!("All background tasks already stopped");
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task failed: {}", e);
        }
    }

    Ok(())
}

fn log_digest(query: &EndpointsQuery, period: HistoryPeriod) {
    let now = Utc::now();
    let endpoints = query.endpoints(period, now);

    for endpoint in &endpoints {
        let latest =
            |kind: MetricKind| endpoint.metrics.get(kind.name()).map_or(0.0, |v| v.latest());
        info!(
            endpoint = %endpoint.name,
            instances = endpoint.endpoint_instance_ids.len(),
            stale = endpoint.is_stale,
            throughput = latest(MetricKind::Throughput),
            processing_ms = latest(MetricKind::ProcessingTime),
            critical_ms = latest(MetricKind::CriticalTime),
            retries = latest(MetricKind::Retries),
            queue_length = latest(MetricKind::QueueLength),
            "Endpoint digest"
        );
    }

    info!(
        endpoints = endpoints.len(),
        connected = query.connected_count(now),
        disconnected = query.disconnected_count(now),
        "Monitoring digest"
    );
}
