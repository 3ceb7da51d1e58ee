//! The engine that owns every registry, tracker and store.
//!
//! One `MonitoringEngine` is created per process and shared behind an `Arc`
//! by the report receiver, the query layer and the sweeper.

use crate::breakdown::{
    EndpointInputQueueRegistry, EndpointInstanceId, EndpointRegistry, MessageTypeRegistry,
};
use crate::core::MonitoringConfig;
use crate::metrics::{MetricStore, QueueLengthStore};
use crate::monitoring::ActivityTracker;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Registries, liveness state and metric stores of one monitoring process
pub struct MonitoringEngine {
    endpoints: EndpointRegistry,
    input_queues: EndpointInputQueueRegistry,
    message_types: MessageTypeRegistry,
    activity: ActivityTracker,
    processing_time: MetricStore,
    critical_time: MetricStore,
    retries: MetricStore,
    queue_length: QueueLengthStore,
}

impl MonitoringEngine {
    /// Create an engine from the monitoring section of the configuration
    pub fn new(config: &MonitoringConfig) -> Self {
        info!(
            grace_period = ?config.endpoint_uptime_grace_period,
            "Creating monitoring engine"
        );
        Self::with_grace_period(config.endpoint_uptime_grace_period)
    }

    /// Create an engine with the given staleness grace period
    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self {
            endpoints: EndpointRegistry::new(),
            input_queues: EndpointInputQueueRegistry::new(),
            message_types: MessageTypeRegistry::new(),
            activity: ActivityTracker::new(grace_period),
            processing_time: MetricStore::new(),
            critical_time: MetricStore::new(),
            retries: MetricStore::new(),
            queue_length: QueueLengthStore::new(),
        }
    }

    /// Known endpoint instances
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// Known endpoint input queues
    pub fn input_queues(&self) -> &EndpointInputQueueRegistry {
        &self.input_queues
    }

    /// Known message types
    pub fn message_types(&self) -> &MessageTypeRegistry {
        &self.message_types
    }

    /// Instance liveness
    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    /// Processing time samples; also the source of throughput
    pub fn processing_time(&self) -> &MetricStore {
        &self.processing_time
    }

    /// Critical time samples
    pub fn critical_time(&self) -> &MetricStore {
        &self.critical_time
    }

    /// Retry occurrences
    pub fn retries(&self) -> &MetricStore {
        &self.retries
    }

    /// Queue length gauges
    pub fn queue_length(&self) -> &QueueLengthStore {
        &self.queue_length
    }

    /// Forget one instance. Returns true when anything was removed.
    ///
    /// Stored samples stay in the rings and age out on their own.
    pub fn remove_endpoint_instance(&self, endpoint_name: &str, instance_id: &str) -> bool {
        let instance = EndpointInstanceId::new(endpoint_name, instance_id);
        self.remove_instance(&instance)
    }

    /// Forget every instance last seen before `cutoff`.
    ///
    /// Each candidate is re-checked against the tracker while it is removed,
    /// so an instance that reports during the sweep is kept.
    pub fn purge_instances_silent_since(&self, cutoff: DateTime<Utc>) -> Vec<EndpointInstanceId> {
        let grouped = self.endpoints.get_grouped_by_endpoint_name();

        grouped
            .values()
            .flatten()
            .filter(|instance| self.activity.is_stale_since(instance, cutoff))
            .filter(|instance| self.expire_instance(instance, cutoff))
            .cloned()
            .collect()
    }

    fn expire_instance(&self, instance: &EndpointInstanceId, cutoff: DateTime<Utc>) -> bool {
        let expired = match self.activity.last_seen(instance) {
            Some(_) => self.activity.remove_if_silent_since(instance, cutoff),
            // registered but never tracked
            None => true,
        };

        if expired {
            self.endpoints.remove_breakdown(instance);
            debug!(instance = %instance, "Expired endpoint instance");
        }

        expired
    }

    fn remove_instance(&self, instance: &EndpointInstanceId) -> bool {
        let from_registry = self.endpoints.remove_breakdown(instance);
        let from_tracker = self.activity.remove(instance);

        if from_registry || from_tracker {
            debug!(instance = %instance, "Removed endpoint instance");
        }

        from_registry || from_tracker
    }
}
