//! Ingestion of decoded endpoint reports.
//!
//! The transport layer turns bus messages into [`Report`] values; the
//! [`ReportReceiver`] routes each one into the registries, the activity
//! tracker and the metric stores of a [`MonitoringEngine`].

use crate::breakdown::{BreakdownKey, EndpointInputQueue, EndpointInstanceId, EndpointMessageType};
use crate::engine::MonitoringEngine;
use crate::metrics::{MetricStore, RawEntry};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Duration metrics reported per processed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMetric {
    /// Time spent in the handler
    ProcessingTime,
    /// Time from sending until processing finished
    CriticalTime,
}

/// A decoded report from one endpoint instance
#[derive(Debug, Clone)]
pub enum Report {
    /// Duration samples, optionally tagged with the handled message type
    TaggedDurations {
        /// Reporting instance
        instance: EndpointInstanceId,
        /// Which duration the samples measure
        metric: DurationMetric,
        /// Message type tag, when the endpoint sent one
        message_type: Option<String>,
        /// Samples in milliseconds
        entries: Vec<RawEntry>,
    },
    /// One entry per retried message
    Retries {
        /// Reporting instance
        instance: EndpointInstanceId,
        /// Message type tag, when the endpoint sent one
        message_type: Option<String>,
        /// Occurrences
        entries: Vec<RawEntry>,
    },
    /// Queue length gauge readings for an input queue
    QueueLength {
        /// Reporting instance
        instance: EndpointInstanceId,
        /// Observed queue address
        input_queue: String,
        /// Gauge readings
        entries: Vec<RawEntry>,
    },
    /// Static endpoint description sent at startup
    EndpointMetadata {
        /// Reporting instance
        instance: EndpointInstanceId,
        /// The instance's input queue address
        input_queue: String,
    },
    /// Liveness ping without samples
    Heartbeat {
        /// Reporting instance
        instance: EndpointInstanceId,
    },
}

impl Report {
    /// The instance that sent the report
    pub fn instance(&self) -> &EndpointInstanceId {
        match self {
            Report::TaggedDurations { instance, .. }
            | Report::Retries { instance, .. }
            | Report::QueueLength { instance, .. }
            | Report::EndpointMetadata { instance, .. }
            | Report::Heartbeat { instance } => instance,
        }
    }
}

/// Routes decoded reports into the engine
pub struct ReportReceiver {
    engine: Arc<MonitoringEngine>,
    reports_handled: AtomicU64,
}

impl ReportReceiver {
    /// Create a receiver feeding `engine`
    pub fn new(engine: Arc<MonitoringEngine>) -> Self {
        Self {
            engine,
            reports_handled: AtomicU64::new(0),
        }
    }

    /// Handle one report observed at `now`
    pub fn handle(&self, report: Report, now: DateTime<Utc>) {
        let instance = report.instance();
        self.engine.endpoints().record(instance.clone());
        self.engine.activity().record(instance, now);

        match &report {
            Report::TaggedDurations {
                instance,
                metric,
                message_type,
                entries,
            } => {
                let store = match metric {
                    DurationMetric::ProcessingTime => self.engine.processing_time(),
                    DurationMetric::CriticalTime => self.engine.critical_time(),
                };
                self.store_tagged(store, instance, message_type.as_deref(), entries);
            },
            Report::Retries {
                instance,
                message_type,
                entries,
            } => {
                self.store_tagged(
                    self.engine.retries(),
                    instance,
                    message_type.as_deref(),
                    entries,
                );
            },
            Report::QueueLength {
                instance,
                input_queue,
                entries,
            } => {
                let queue = self.record_queue(instance, input_queue);
                self.engine.queue_length().store(&queue, entries);
            },
            Report::EndpointMetadata {
                instance,
                input_queue,
            } => {
                self.record_queue(instance, input_queue);
            },
            Report::Heartbeat { .. } => {},
        }

        self.reports_handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of reports handled so far
    pub fn reports_handled(&self) -> u64 {
        self.reports_handled.load(Ordering::Relaxed)
    }

    fn store_tagged(
        &self,
        store: &MetricStore,
        instance: &EndpointInstanceId,
        message_type: Option<&str>,
        entries: &[RawEntry],
    ) {
        let message_type = message_type
            .filter(|name| !name.is_empty())
            .map(|name| EndpointMessageType::new(instance.endpoint_name(), name));

        if let Some(message_type) = &message_type {
            self.engine.message_types().record(message_type.clone());
        }

        trace!(instance = %instance, entries = entries.len(), "Storing samples");
        store.store(instance, entries, message_type.as_ref());
    }

    fn record_queue(&self, instance: &EndpointInstanceId, input_queue: &str) -> EndpointInputQueue {
        let queue = EndpointInputQueue::new(instance.endpoint_name(), input_queue);
        self.engine.input_queues().record(queue.clone());
        queue
    }
}
