//! Multi-granularity time-series storage keyed by breakdown.
//!
//! - [`IntervalsStore`]: one granularity, one lazily created ring per key
//! - [`VariableHistoryStore`]: one `IntervalsStore` per [`HistoryPeriod`]
//! - [`MetricStore`]: instance and message-type breakdowns of one metric

use crate::breakdown::{BreakdownKey, EndpointInputQueue, EndpointInstanceId, EndpointMessageType};
use crate::metrics::{
    ring_buffer::Measurement,
    types::{duration_ticks, ticks_from_datetime, HistoryPeriod, IntervalsBreakdown, RawEntry},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Ring-buffer time store for a single granularity
pub struct IntervalsStore<K: BreakdownKey> {
    histories: DashMap<K, Arc<Measurement>>,
    interval_size_ticks: i64,
    number_of_intervals: usize,
    delayed_intervals: usize,
}

impl<K: BreakdownKey> IntervalsStore<K> {
    /// Create a store reporting `number_of_intervals` intervals of
    /// `interval_size`, lagging `delayed_intervals` behind now
    pub fn new(
        interval_size: Duration,
        number_of_intervals: usize,
        delayed_intervals: usize,
    ) -> Self {
        let interval_size_ticks = duration_ticks(interval_size);
        assert!(interval_size_ticks > 0, "Interval size must be at least one tick");
        assert!(number_of_intervals > 0, "Number of intervals must be greater than 0");

        Self {
            histories: DashMap::new(),
            interval_size_ticks,
            number_of_intervals,
            delayed_intervals,
        }
    }

    /// Create a store shaped like `period`
    pub fn for_period(period: HistoryPeriod) -> Self {
        Self::new(
            period.interval_size(),
            period.number_of_intervals(),
            period.delayed_intervals(),
        )
    }

    /// Record a batch of entries for `id`
    pub fn store(&self, id: &K, entries: &[RawEntry]) {
        let measurement = self.measurement_for(id);
        let dropped = measurement.record(entries);

        if dropped > 0 {
            trace!(
                endpoint = id.endpoint_name(),
                breakdown = ?id,
                dropped,
                "Dropped entries older than their slot"
            );
        }
    }

    /// Snapshot of every key's last `number_of_intervals` intervals, ending
    /// `delayed_intervals` before the interval containing `now`
    pub fn get_intervals(&self, now: DateTime<Utc>) -> Vec<IntervalsBreakdown<K>> {
        let current_epoch = ticks_from_datetime(now).div_euclid(self.interval_size_ticks);
        let starting_epoch = current_epoch - self.delayed_intervals as i64;

        // Release the map shards before taking per-key read locks
        let measurements: Vec<(K, Arc<Measurement>)> = self
            .histories
            .iter()
            .map(|item| (item.key().clone(), Arc::clone(item.value())))
            .collect();

        measurements
            .into_iter()
            .map(|(id, measurement)| {
                let report = measurement.report(starting_epoch, self.number_of_intervals);
                IntervalsBreakdown {
                    id,
                    intervals: report.intervals,
                    total_value: report.total_value,
                    total_measurements: report.total_measurements,
                }
            })
            .collect()
    }

    /// Number of keys with a ring
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// True when nothing was stored yet
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    fn measurement_for(&self, id: &K) -> Arc<Measurement> {
        if let Some(existing) = self.histories.get(id) {
            return Arc::clone(existing.value());
        }

        let entry = self.histories.entry(id.clone()).or_insert_with(|| {
            Arc::new(Measurement::new(self.number_of_intervals, self.interval_size_ticks))
        });
        Arc::clone(entry.value())
    }
}

/// One [`IntervalsStore`] per supported [`HistoryPeriod`]
pub struct VariableHistoryStore<K: BreakdownKey> {
    stores: [IntervalsStore<K>; 6],
}

impl<K: BreakdownKey> VariableHistoryStore<K> {
    /// Create stores for every period in [`HistoryPeriod::ALL`]
    pub fn new() -> Self {
        Self {
            stores: HistoryPeriod::ALL.map(IntervalsStore::for_period),
        }
    }

    /// Record entries at every granularity
    pub fn store(&self, id: &K, entries: &[RawEntry]) {
        for store in &self.stores {
            store.store(id, entries);
        }
    }

    /// Snapshot at the granularity of `period`
    pub fn get_intervals(
        &self,
        period: HistoryPeriod,
        now: DateTime<Utc>,
    ) -> Vec<IntervalsBreakdown<K>> {
        self.stores[period.index()].get_intervals(now)
    }

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.stores[0].len()
    }

    /// True when nothing was stored yet
    pub fn is_empty(&self) -> bool {
        self.stores[0].is_empty()
    }
}

impl<K: BreakdownKey> Default for VariableHistoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Store for queue length gauges
pub type QueueLengthStore = VariableHistoryStore<EndpointInputQueue>;

/// Store for one instance-reported metric, broken down by instance and by
/// message type
#[derive(Default)]
pub struct MetricStore {
    by_instance: VariableHistoryStore<EndpointInstanceId>,
    by_message_type: VariableHistoryStore<EndpointMessageType>,
}

impl MetricStore {
    /// Create an empty metric store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record entries for an instance and, when known, the message type
    pub fn store(
        &self,
        instance: &EndpointInstanceId,
        entries: &[RawEntry],
        message_type: Option<&EndpointMessageType>,
    ) {
        self.by_instance.store(instance, entries);
        if let Some(message_type) = message_type {
            self.by_message_type.store(message_type, entries);
        }
    }

    /// Snapshot broken down by instance
    pub fn instance_intervals(
        &self,
        period: HistoryPeriod,
        now: DateTime<Utc>,
    ) -> Vec<IntervalsBreakdown<EndpointInstanceId>> {
        self.by_instance.get_intervals(period, now)
    }

    /// Snapshot broken down by message type
    pub fn message_type_intervals(
        &self,
        period: HistoryPeriod,
        now: DateTime<Utc>,
    ) -> Vec<IntervalsBreakdown<EndpointMessageType>> {
        self.by_message_type.get_intervals(period, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::TICKS_PER_SECOND;
    use crate::metrics::ticks_to_datetime;

    fn instance() -> EndpointInstanceId {
        EndpointInstanceId::new("Sales", "host-1")
    }

    #[test]
    fn test_empty_store() {
        let store: IntervalsStore<EndpointInstanceId> =
            IntervalsStore::for_period(HistoryPeriod::ONE_MINUTE);
        assert!(store.is_empty());
        assert!(store.get_intervals(Utc::now()).is_empty());
    }

    #[test]
    fn test_delayed_window_excludes_current_interval() {
        let store = IntervalsStore::for_period(HistoryPeriod::ONE_MINUTE);
        let now_ticks = 1_000 * TICKS_PER_SECOND;

        store.store(
            &instance(),
            &[
                RawEntry::new(now_ticks, 100),                    // current, hidden
                RawEntry::new(now_ticks - TICKS_PER_SECOND, 100), // delayed, hidden
                RawEntry::new(now_ticks - 2 * TICKS_PER_SECOND, 7),
            ],
        );

        let breakdowns = store.get_intervals(ticks_to_datetime(now_ticks));
        assert_eq!(breakdowns.len(), 1);

        let breakdown = &breakdowns[0];
        assert_eq!(breakdown.intervals.len(), 60);
        assert_eq!(breakdown.intervals[0].interval_start, now_ticks - 2 * TICKS_PER_SECOND);
        assert_eq!(breakdown.intervals[0].total_value, 7);
        assert_eq!(breakdown.total_value, 7);
        assert_eq!(breakdown.total_measurements, 1);
    }

    #[test]
    fn test_one_breakdown_per_key() {
        let store = IntervalsStore::for_period(HistoryPeriod::FIVE_MINUTES);
        store.store(&EndpointInstanceId::new("Sales", "a"), &[RawEntry::new(0, 1)]);
        store.store(&EndpointInstanceId::new("Sales", "b"), &[RawEntry::new(0, 1)]);
        store.store(&EndpointInstanceId::new("Sales", "a"), &[RawEntry::new(0, 1)]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_intervals(Utc::now()).len(), 2);
    }

    #[test]
    fn test_variable_store_fans_out() {
        let store = VariableHistoryStore::new();
        let now = Utc::now();
        let sample_time = now - chrono::Duration::minutes(3);

        store.store(&instance(), &[RawEntry::at(sample_time, 5)]);

        for period in HistoryPeriod::ALL {
            let breakdowns = store.get_intervals(period, now);
            let total: i64 = breakdowns.iter().map(|b| b.total_measurements).sum();
            let expected = if period == HistoryPeriod::ONE_MINUTE { 0 } else { 1 };
            assert_eq!(total, expected, "period {} minutes", period.minutes());
        }
    }

    #[test]
    fn test_metric_store_breakdowns() {
        let store = MetricStore::new();
        let message_type = EndpointMessageType::new("Sales", "PlaceOrder");
        let now = Utc::now();
        let entries = [RawEntry::at(now - chrono::Duration::seconds(30), 12)];

        store.store(&instance(), &entries, Some(&message_type));
        store.store(&EndpointInstanceId::new("Sales", "host-2"), &entries, None);

        let by_instance = store.instance_intervals(HistoryPeriod::FIVE_MINUTES, now);
        let by_type = store.message_type_intervals(HistoryPeriod::FIVE_MINUTES, now);

        assert_eq!(by_instance.len(), 2);
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].id, message_type);
        assert_eq!(by_type[0].total_value, 12);
    }
}
