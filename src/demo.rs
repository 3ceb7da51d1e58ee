//! Synthetic endpoint reporters for demos and local testing.
//!
//! Generates plausible processing times, retries and queue lengths for a set
//! of fake endpoints and feeds them through a [`ReportReceiver`], so the
//! engine can be exercised without a message bus.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use crate::breakdown::EndpointInstanceId;
use crate::core::DemoConfig;
use crate::metrics::RawEntry;
use crate::receiver::{DurationMetric, Report, ReportReceiver};
use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info};

const ENDPOINT_NAMES: [&str; 5] = ["Sales", "Billing", "Shipping", "Inventory", "Notifications"];

/// Shape of one simulated endpoint
#[derive(Debug, Clone)]
struct EndpointProfile {
    name: String,
    instances: Vec<EndpointInstanceId>,
    input_queue: String,
    message_types: Vec<String>,
    /// Messages per report, per instance
    base_rate: f64,
    /// Median handler time in milliseconds
    base_processing_ms: u64,
    /// Share of messages that are retried (0.0 to 1.0)
    retry_rate: f64,
}

impl EndpointProfile {
    fn new(index: usize, instances_per_endpoint: usize) -> Self {
        let base = ENDPOINT_NAMES[index % ENDPOINT_NAMES.len()];
        let name = if index < ENDPOINT_NAMES.len() {
            base.to_owned()
        } else {
            format!("{base}{}", index / ENDPOINT_NAMES.len() + 1)
        };

        let instances = (0..instances_per_endpoint)
            .map(|i| {
                let instance_id = format!("{}-{i}", name.to_lowercase());
                EndpointInstanceId::with_name(&name, instance_id, format!("host-{i}"))
            })
            .collect();

        let message_types = ["Created", "Updated"]
            .iter()
            .map(|event| {
                format!(
                    "Demo.{name}{event}, Demo.Messages, Version=1.0.0.0, \
                     Culture=neutral, PublicKeyToken=null"
                )
            })
            .collect();

        Self {
            input_queue: name.to_lowercase(),
            instances,
            message_types,
            base_rate: 5.0 + index as f64 * 3.0,
            base_processing_ms: 20 + index as u64 * 35,
            retry_rate: 0.02 * (index % 3) as f64,
            name,
        }
    }

    /// Processing time with a long tail and ±10% jitter
    fn processing_ms(&self) -> i64 {
        let mut rng = thread_rng();
        let percentile: f64 = rng.gen();
        let base = self.base_processing_ms as f64;

        let ms = if percentile < 0.95 {
            base * (0.5 + percentile)
        } else {
            base * 4.0
        };

        (ms * rng.gen_range(0.9..1.1)) as i64
    }

    fn message_count(&self) -> usize {
        let variation = thread_rng().gen_range(-0.2..0.2);
        (self.base_rate * (1.0 + variation)).round().max(0.0) as usize
    }
}

/// In-process generator of endpoint reports
pub struct DemoReporter {
    receiver: Arc<ReportReceiver>,
    endpoints: Vec<EndpointProfile>,
    report_interval: Duration,
    announced: AtomicBool,
}

impl DemoReporter {
    /// Create a generator shaped by `config`
    pub fn new(receiver: Arc<ReportReceiver>, config: &DemoConfig) -> Self {
        let endpoints = (0..config.endpoints)
            .map(|index| EndpointProfile::new(index, config.instances_per_endpoint))
            .collect();

        Self {
            receiver,
            endpoints,
            report_interval: config.report_interval,
            announced: AtomicBool::new(false),
        }
    }

    /// Names of the simulated endpoints
    pub fn endpoint_names(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.name.as_str()).collect()
    }

    /// One round of reports from every simulated instance.
    ///
    /// The first round also announces each instance's input queue.
    pub fn reports_at(&self, now: DateTime<Utc>) -> Vec<Report> {
        let first_round = !self.announced.swap(true, Ordering::Relaxed);
        let mut rng = thread_rng();
        let mut reports = Vec::new();

        for endpoint in &self.endpoints {
            for instance in &endpoint.instances {
                if first_round {
                    reports.push(Report::EndpointMetadata {
                        instance: instance.clone(),
                        input_queue: endpoint.input_queue.clone(),
                    });
                }

                let message_type =
                    &endpoint.message_types[rng.gen_range(0..endpoint.message_types.len())];
                let count = endpoint.message_count();

                let mut processing = Vec::with_capacity(count);
                let mut critical = Vec::with_capacity(count);
                let mut retries = Vec::new();

                for _ in 0..count {
                    let offset = chrono::Duration::milliseconds(rng.gen_range(0..1000));
                    let processed_ms = endpoint.processing_ms();
                    let waited_ms = rng.gen_range(0..processed_ms.max(1) * 2);

                    processing.push(RawEntry::at(now - offset, processed_ms));
                    critical.push(RawEntry::at(now - offset, processed_ms + waited_ms));
                    if rng.gen::<f64>() < endpoint.retry_rate {
                        retries.push(RawEntry::at(now - offset, 1));
                    }
                }

                reports.push(Report::TaggedDurations {
                    instance: instance.clone(),
                    metric: DurationMetric::ProcessingTime,
                    message_type: Some(message_type.clone()),
                    entries: processing,
                });
                reports.push(Report::TaggedDurations {
                    instance: instance.clone(),
                    metric: DurationMetric::CriticalTime,
                    message_type: Some(message_type.clone()),
                    entries: critical,
                });
                if !retries.is_empty() {
                    reports.push(Report::Retries {
                        instance: instance.clone(),
                        message_type: Some(message_type.clone()),
                        entries: retries,
                    });
                }
                reports.push(Report::QueueLength {
                    instance: instance.clone(),
                    input_queue: endpoint.input_queue.clone(),
                    entries: vec![RawEntry::at(now, rng.gen_range(0..(count as i64 * 4 + 1)))],
                });
            }
        }

        reports
    }

    /// Generate and deliver one round. Returns the number of reports sent.
    pub fn emit_once(&self, now: DateTime<Utc>) -> usize {
        let reports = self.reports_at(now);
        let count = reports.len();

        for report in reports {
            self.receiver.handle(report, now);
        }

        debug!(reports = count, "Delivered synthetic reports");
        count
    }

    /// Emit a round every `report_interval` until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.report_interval);
        info!(
            endpoints = self.endpoints.len(),
            interval = ?self.report_interval,
            "Demo reporters started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.emit_once(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Demo reporters stopped");
    }
}
