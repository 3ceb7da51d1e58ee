//! Pulsegrid - in-memory monitoring engine for message-driven endpoints.
//!
//! Endpoint instances report processing times, retries and queue lengths.
//! Pulsegrid keeps the last hour of those reports in fixed-size ring buffers
//! at six granularities and answers dashboard queries from them.
//!
//! # Features
//!
//! - **Multi-granularity history**: 1, 5, 10, 15, 30 and 60 minute windows of
//!   60 intervals each, fed from a single ingestion call
//! - **Out-of-order tolerant**: late samples accumulate into their own interval
//!   and never clobber a newer one
//! - **Lock-free reads**: registry snapshots are swapped atomically
//! - **Liveness**: stale and disconnected endpoints, with expiry sweeping
//!
//! # Architecture
//!
//! - `breakdown`: key types and the endpoint/queue/message-type registries
//! - `metrics`: ring buffers, stores and reductions
//! - `monitoring`: activity tracking and the expiry sweeper
//! - `engine`: the shared state of one process
//! - `receiver`: ingestion of decoded reports
//! - `query`: dashboard payloads
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use pulsegrid_lib::breakdown::EndpointInstanceId;
//! use pulsegrid_lib::metrics::{HistoryPeriod, RawEntry};
//! use pulsegrid_lib::query::EndpointsQuery;
//! use pulsegrid_lib::receiver::{DurationMetric, Report, ReportReceiver};
//! use pulsegrid_lib::{Config, MonitoringEngine};
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let engine = Arc::new(MonitoringEngine::new(&config.monitoring));
//! let receiver = ReportReceiver::new(Arc::clone(&engine));
//! let now = chrono::Utc::now();
//!
//! receiver.handle(
//!     Report::TaggedDurations {
//!         instance: EndpointInstanceId::new("Sales", "host-1"),
//!         metric: DurationMetric::ProcessingTime,
//!         message_type: None,
//!         entries: vec![RawEntry::at(now, 120)],
//!     },
//!     now,
//! );
//!
//! let endpoints = EndpointsQuery::new(engine).endpoints(HistoryPeriod::ONE_MINUTE, now);
//! assert_eq!(endpoints[0].name, "Sales");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod breakdown;
pub mod cli;
pub mod core;
pub mod demo;
pub mod engine;
pub mod metrics;
pub mod monitoring;
pub mod query;
pub mod receiver;

// Re-export core types for convenience
pub use crate::core::{Config, MonitorError, Result};
pub use crate::engine::MonitoringEngine;
