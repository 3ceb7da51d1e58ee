//! Dashboard queries over the monitoring engine.
//!
//! Composes registry lookups, store snapshots and reductions into the payloads
//! of the endpoint overview and the endpoint detail view.

pub mod model;

use crate::breakdown::{BreakdownKey, EndpointInputQueue};
use crate::core::{MonitorError, Result};
use crate::engine::MonitoringEngine;
use crate::metrics::{
    ticks_to_datetime, HistoryPeriod, IntervalsBreakdown, MetricStore, MonitoredValues, Reduction,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

pub use model::{
    MessageTypeDescriptor, MetricDigest, MetricValues, MonitoredEndpoint, MonitoredEndpointDetails,
    MonitoredEndpointInstance, MonitoredEndpointMessageType, MonitoredValuesWithTimings,
};

/// Metrics shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Mean handler duration
    ProcessingTime,
    /// Mean send-to-processed duration
    CriticalTime,
    /// Retries per second
    Retries,
    /// Processed messages per second
    Throughput,
    /// Messages waiting in the input queues
    QueueLength,
}

impl MetricKind {
    /// Metrics that get a full series with time axis in the detail view
    pub const DETAILED: [MetricKind; 5] = [
        MetricKind::Throughput,
        MetricKind::QueueLength,
        MetricKind::ProcessingTime,
        MetricKind::CriticalTime,
        MetricKind::Retries,
    ];

    /// Name used as the key of the metric maps
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::ProcessingTime => "ProcessingTime",
            MetricKind::CriticalTime => "CriticalTime",
            MetricKind::Retries => "Retries",
            MetricKind::Throughput => "Throughput",
            MetricKind::QueueLength => "QueueLength",
        }
    }

    /// How breakdowns of this metric reduce to a series
    pub fn reduction(self) -> Reduction {
        match self {
            MetricKind::ProcessingTime | MetricKind::CriticalTime => Reduction::Averages,
            MetricKind::Retries | MetricKind::Throughput => Reduction::TotalMeasurementsPerSecond,
            MetricKind::QueueLength => Reduction::RoundedSumOfBreakdownAverages,
        }
    }

    /// True when the detail view shows the full series
    pub fn is_detailed(self) -> bool {
        Self::DETAILED.contains(&self)
    }
}

/// A metric backed by a per-instance / per-message-type store
struct SampledMetric {
    kind: MetricKind,
    store: fn(&MonitoringEngine) -> &MetricStore,
}

/// Metrics reported per instance and per message type, in display order
const SAMPLED_METRICS: [SampledMetric; 4] = [
    SampledMetric {
        kind: MetricKind::ProcessingTime,
        store: MonitoringEngine::processing_time,
    },
    SampledMetric {
        kind: MetricKind::CriticalTime,
        store: MonitoringEngine::critical_time,
    },
    SampledMetric {
        kind: MetricKind::Retries,
        store: MonitoringEngine::retries,
    },
    SampledMetric {
        kind: MetricKind::Throughput,
        store: MonitoringEngine::processing_time,
    },
];

/// Read side of the engine used by the HTTP handlers
pub struct EndpointsQuery {
    engine: Arc<MonitoringEngine>,
}

impl EndpointsQuery {
    /// Create a query facade over `engine`
    pub fn new(engine: Arc<MonitoringEngine>) -> Self {
        Self { engine }
    }

    /// Overview of every known endpoint for a window given in minutes
    pub fn endpoints_for_history(
        &self,
        history_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitoredEndpoint>> {
        let period = HistoryPeriod::from_minutes(history_minutes)?;
        Ok(self.endpoints(period, now))
    }

    /// Overview of every known endpoint, sorted by name
    pub fn endpoints(&self, period: HistoryPeriod, now: DateTime<Utc>) -> Vec<MonitoredEndpoint> {
        let grouped = self.engine.endpoints().get_grouped_by_endpoint_name();
        let activity = self.engine.activity();

        let mut endpoints: Vec<MonitoredEndpoint> = grouped
            .iter()
            .map(|(name, instances)| MonitoredEndpoint {
                name: name.clone(),
                endpoint_instance_ids: instances
                    .iter()
                    .map(|i| i.instance_id().to_owned())
                    .collect(),
                is_stale: instances.iter().any(|i| activity.is_stale_at(i, now)),
                metrics: MetricValues::new(),
            })
            .collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));

        for metric in &SAMPLED_METRICS {
            let intervals = (metric.store)(&self.engine).instance_intervals(period, now);
            fill_endpoint_metric(&mut endpoints, metric.kind, &intervals, period);
        }

        let queue_keys = self.engine.input_queues().get_grouped_by_endpoint_name();
        let queues = self.engine.queue_length().get_intervals(period, now);
        let by_queue = index_by_key(&queues);
        let reduction = MetricKind::QueueLength.reduction();
        for endpoint in &mut endpoints {
            let keys = queue_keys.get(&endpoint.name).map_or(&[][..], Vec::as_slice);
            let scoped = registered_breakdowns(&by_queue, keys);
            endpoint
                .metrics
                .insert(MetricKind::QueueLength.name(), reduction.apply(&scoped, period));
        }

        endpoints
    }

    /// Detail view of one endpoint. Unknown endpoints produce empty details.
    pub fn endpoint_details(
        &self,
        endpoint_name: &str,
        period: HistoryPeriod,
        now: DateTime<Utc>,
    ) -> MonitoredEndpointDetails {
        let activity = self.engine.activity();
        let instance_keys = self.engine.endpoints().get_for_endpoint_name(endpoint_name);
        let message_type_keys = self.engine.message_types().get_for_endpoint_name(endpoint_name);

        let mut details = MonitoredEndpointDetails {
            instances: instance_keys
                .iter()
                .map(|key| MonitoredEndpointInstance {
                    id: key.instance_id().to_owned(),
                    name: key.instance_name().to_owned(),
                    is_stale: activity.is_stale_at(key, now),
                    metrics: MetricValues::new(),
                })
                .collect(),
            message_types: message_type_keys
                .iter()
                .map(|key| MonitoredEndpointMessageType {
                    id: key.message_type().to_owned(),
                    descriptor: MessageTypeDescriptor::parse(key.message_type()),
                    metrics: MetricValues::new(),
                })
                .collect(),
            ..Default::default()
        };

        for metric in &SAMPLED_METRICS {
            let reduction = metric.kind.reduction();
            let store = (metric.store)(&self.engine);

            let intervals = store.instance_intervals(period, now);
            let scoped = scope_to_endpoint(&intervals, endpoint_name);
            add_endpoint_values(&mut details, metric.kind, &scoped, period);

            for (instance, key) in details.instances.iter_mut().zip(&instance_keys) {
                let own = select(&scoped, key);
                instance.metrics.insert(metric.kind.name(), reduction.apply(&own, period));
            }

            let intervals = store.message_type_intervals(period, now);
            let scoped = scope_to_endpoint(&intervals, endpoint_name);
            for (message_type, key) in details.message_types.iter_mut().zip(&message_type_keys) {
                let own = select(&scoped, key);
                message_type.metrics.insert(metric.kind.name(), reduction.apply(&own, period));
            }
        }

        let queue_keys = self.engine.input_queues().get_for_endpoint_name(endpoint_name);
        let queues = self.engine.queue_length().get_intervals(period, now);
        let scoped = registered_breakdowns(&index_by_key(&queues), &queue_keys);
        add_endpoint_values(&mut details, MetricKind::QueueLength, &scoped, period);

        details
    }

    /// Number of endpoints whose instances are all stale
    pub fn disconnected_count(&self, now: DateTime<Utc>) -> usize {
        let activity = self.engine.activity();
        self.engine
            .endpoints()
            .get_grouped_by_endpoint_name()
            .values()
            .filter(|instances| instances.iter().all(|i| activity.is_stale_at(i, now)))
            .count()
    }

    /// Number of endpoints with at least one live instance
    pub fn connected_count(&self, now: DateTime<Utc>) -> usize {
        let activity = self.engine.activity();
        self.engine
            .endpoints()
            .get_grouped_by_endpoint_name()
            .values()
            .filter(|instances| instances.iter().any(|i| !activity.is_stale_at(i, now)))
            .count()
    }

    /// Forget one instance of an endpoint
    pub fn remove_endpoint_instance(&self, endpoint_name: &str, instance_id: &str) -> Result<()> {
        if self.engine.remove_endpoint_instance(endpoint_name, instance_id) {
            Ok(())
        } else {
            debug!(endpoint = endpoint_name, instance_id, "No such endpoint instance");
            Err(MonitorError::EndpointNotFound(format!("{endpoint_name}@{instance_id}")))
        }
    }
}

fn scope_to_endpoint<'a, K: BreakdownKey>(
    intervals: &'a [IntervalsBreakdown<K>],
    endpoint_name: &str,
) -> Vec<&'a IntervalsBreakdown<K>> {
    intervals
        .iter()
        .filter(|breakdown| breakdown.id.endpoint_name() == endpoint_name)
        .collect()
}

fn select<'a, K: BreakdownKey>(
    scoped: &[&'a IntervalsBreakdown<K>],
    key: &K,
) -> Vec<&'a IntervalsBreakdown<K>> {
    scoped.iter().copied().filter(|breakdown| breakdown.id == *key).collect()
}

fn index_by_key<K: BreakdownKey>(
    intervals: &[IntervalsBreakdown<K>],
) -> HashMap<&K, &IntervalsBreakdown<K>> {
    intervals.iter().map(|breakdown| (&breakdown.id, breakdown)).collect()
}

/// Breakdowns of the queues currently registered; unregistered rings are ignored
fn registered_breakdowns<'a>(
    by_queue: &HashMap<&'a EndpointInputQueue, &'a IntervalsBreakdown<EndpointInputQueue>>,
    keys: &[EndpointInputQueue],
) -> Vec<&'a IntervalsBreakdown<EndpointInputQueue>> {
    keys.iter().filter_map(|key| by_queue.get(key).copied()).collect()
}

fn fill_endpoint_metric<K: BreakdownKey>(
    endpoints: &mut [MonitoredEndpoint],
    kind: MetricKind,
    intervals: &[IntervalsBreakdown<K>],
    period: HistoryPeriod,
) {
    let mut by_endpoint: HashMap<&str, Vec<&IntervalsBreakdown<K>>> = HashMap::new();
    for breakdown in intervals {
        by_endpoint.entry(breakdown.id.endpoint_name()).or_default().push(breakdown);
    }

    let reduction = kind.reduction();
    for endpoint in endpoints {
        let scoped = by_endpoint.get(endpoint.name.as_str()).map_or(&[][..], Vec::as_slice);
        endpoint.metrics.insert(kind.name(), reduction.apply(scoped, period));
    }
}

fn add_endpoint_values<K: BreakdownKey>(
    details: &mut MonitoredEndpointDetails,
    kind: MetricKind,
    scoped: &[&IntervalsBreakdown<K>],
    period: HistoryPeriod,
) {
    let MonitoredValues { average, points } = kind.reduction().apply(scoped, period);

    details.digest.insert(
        kind.name(),
        MetricDigest {
            latest: points.last().copied().unwrap_or_default(),
            average,
        },
    );

    if kind.is_detailed() {
        details.metric_details.insert(
            kind.name(),
            MonitoredValuesWithTimings {
                average,
                points,
                time_axis_values: time_axis(scoped),
            },
        );
    }
}

/// Distinct interval starts, oldest first, matching the order of the points
fn time_axis<K>(scoped: &[&IntervalsBreakdown<K>]) -> Vec<DateTime<Utc>> {
    scoped
        .iter()
        .flat_map(|breakdown| breakdown.intervals.iter().map(|i| i.interval_start))
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .map(ticks_to_datetime)
        .collect()
}
