//! Common test utilities and fixtures.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use pulsegrid_lib::breakdown::EndpointInstanceId;
use pulsegrid_lib::metrics::RawEntry;
use pulsegrid_lib::query::EndpointsQuery;
use pulsegrid_lib::receiver::{DurationMetric, Report, ReportReceiver};
use pulsegrid_lib::MonitoringEngine;
use std::sync::Arc;
use std::time::Duration;

/// Fixed wall clock used by the scenarios
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// Engine, receiver and query facade wired together
pub struct Harness {
    pub engine: Arc<MonitoringEngine>,
    pub receiver: Arc<ReportReceiver>,
    pub query: EndpointsQuery,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_grace_period(Duration::from_secs(40))
    }

    pub fn with_grace_period(grace: Duration) -> Self {
        let engine = Arc::new(MonitoringEngine::with_grace_period(grace));
        Self {
            receiver: Arc::new(ReportReceiver::new(Arc::clone(&engine))),
            query: EndpointsQuery::new(Arc::clone(&engine)),
            engine,
        }
    }
}

/// Test fixture builder for reports with sensible defaults.
pub struct TestReportBuilder {
    endpoint: String,
    instance: String,
    message_type: Option<String>,
    values: Vec<i64>,
    at: DateTime<Utc>,
}

impl TestReportBuilder {
    pub fn new(endpoint: &str, instance: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            instance: instance.to_string(),
            message_type: None,
            values: vec![100],
            at: t0(),
        }
    }

    pub fn message_type(mut self, message_type: &str) -> Self {
        self.message_type = Some(message_type.to_string());
        self
    }

    pub fn values(mut self, values: &[i64]) -> Self {
        self.values = values.to_vec();
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn instance(&self) -> EndpointInstanceId {
        EndpointInstanceId::new(self.endpoint.as_str(), self.instance.as_str())
    }

    fn entries(&self) -> Vec<RawEntry> {
        self.values.iter().map(|v| RawEntry::at(self.at, *v)).collect()
    }

    pub fn processing_time(self) -> Report {
        Report::TaggedDurations {
            instance: self.instance(),
            metric: DurationMetric::ProcessingTime,
            entries: self.entries(),
            message_type: self.message_type,
        }
    }

    pub fn critical_time(self) -> Report {
        Report::TaggedDurations {
            instance: self.instance(),
            metric: DurationMetric::CriticalTime,
            entries: self.entries(),
            message_type: self.message_type,
        }
    }

    pub fn retries(self) -> Report {
        Report::Retries {
            instance: self.instance(),
            entries: self.entries(),
            message_type: self.message_type,
        }
    }

    pub fn queue_length(self, input_queue: &str) -> Report {
        Report::QueueLength {
            instance: self.instance(),
            entries: self.entries(),
            input_queue: input_queue.to_string(),
        }
    }

    pub fn heartbeat(self) -> Report {
        Report::Heartbeat {
            instance: self.instance(),
        }
    }
}
