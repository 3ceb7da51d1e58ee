//! Concurrent registry of breakdown keys grouped by endpoint name.
//!
//! Writers serialize on one mutex and, on structural change, publish a fresh
//! immutable grouping through an [`ArcSwap`]. Readers only load that snapshot,
//! so they never wait on writers.

use crate::breakdown::keys::{
    BreakdownKey, EndpointInputQueue, EndpointInstanceId, EndpointMessageType,
};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Immutable endpoint name to keys grouping
pub type EndpointGrouping<K> = HashMap<String, Vec<K>>;

/// Registry of known endpoint instances
pub type EndpointRegistry = BreakdownRegistry<EndpointInstanceId>;
/// Registry of known endpoint input queues
pub type EndpointInputQueueRegistry = BreakdownRegistry<EndpointInputQueue>;
/// Registry of known endpoint message types
pub type MessageTypeRegistry = BreakdownRegistry<EndpointMessageType>;

/// Registry of breakdown keys with lock-free grouped reads
pub struct BreakdownRegistry<K: BreakdownKey> {
    /// Existence set; the value is the latest version of the key
    breakdowns: Mutex<HashMap<K, K>>,
    lookup: ArcSwap<EndpointGrouping<K>>,
}

impl<K: BreakdownKey> BreakdownRegistry<K> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            breakdowns: Mutex::new(HashMap::new()),
            lookup: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Insert or update a key.
    ///
    /// Returns true when the grouping was republished.
    pub fn record(&self, breakdown: K) -> bool {
        let mut breakdowns = self.breakdowns.lock();

        let changed = match breakdowns.get(&breakdown) {
            Some(existing) => existing.details_differ(&breakdown),
            None => true,
        };

        if changed {
            debug!(
                endpoint = breakdown.endpoint_name(),
                breakdown = ?breakdown,
                "Registering breakdown"
            );
            breakdowns.insert(breakdown.clone(), breakdown);
            self.publish(&breakdowns);
        }

        changed
    }

    /// Remove a key. Returns true when it was present.
    pub fn remove_breakdown(&self, breakdown: &K) -> bool {
        let mut breakdowns = self.breakdowns.lock();

        if breakdowns.remove(breakdown).is_some() {
            debug!(
                endpoint = breakdown.endpoint_name(),
                breakdown = ?breakdown,
                "Removed breakdown"
            );
            self.publish(&breakdowns);
            true
        } else {
            false
        }
    }

    /// Keys of one endpoint from the current snapshot
    pub fn get_for_endpoint_name(&self, endpoint_name: &str) -> Vec<K> {
        self.lookup
            .load()
            .get(endpoint_name)
            .cloned()
            .unwrap_or_default()
    }

    /// The current grouping snapshot
    pub fn get_grouped_by_endpoint_name(&self) -> Arc<EndpointGrouping<K>> {
        self.lookup.load_full()
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.breakdowns.lock().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, breakdowns: &HashMap<K, K>) {
        let mut grouped: EndpointGrouping<K> = HashMap::new();
        for breakdown in breakdowns.values() {
            grouped
                .entry(breakdown.endpoint_name().to_owned())
                .or_default()
                .push(breakdown.clone());
        }
        for keys in grouped.values_mut() {
            keys.sort();
        }

        self.lookup.store(Arc::new(grouped));
    }
}

impl<K: BreakdownKey> Default for BreakdownRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
