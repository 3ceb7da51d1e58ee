//! Instance liveness tracking and expiry sweeping.
//!
//! [`ActivityTracker`] remembers when each endpoint instance last reported and
//! classifies it as stale. [`InstanceSweeper`] periodically forgets instances
//! that stayed silent past the configured retention.

use crate::breakdown::EndpointInstanceId;
use crate::engine::MonitoringEngine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

/// Last-seen timestamps per instance.
///
/// Writes are last-writer-wins: when two `record` calls race for one key, the
/// one that completes last is kept even if it carries the older timestamp.
/// Callers pass their own `now` and should keep it non-decreasing per key.
pub struct ActivityTracker {
    last_seen: DashMap<EndpointInstanceId, DateTime<Utc>>,
    staleness_threshold: Duration,
}

impl ActivityTracker {
    /// Create a tracker reporting instances silent for longer than
    /// `staleness_threshold` as stale
    pub fn new(staleness_threshold: Duration) -> Self {
        Self {
            last_seen: DashMap::new(),
            staleness_threshold,
        }
    }

    /// The configured grace period
    pub fn staleness_threshold(&self) -> Duration {
        self.staleness_threshold
    }

    /// Remember `now` as the last time `instance` reported
    pub fn record(&self, instance: &EndpointInstanceId, now: DateTime<Utc>) {
        self.last_seen.insert(instance.clone(), now);
    }

    /// Stale against the wall clock
    pub fn is_stale(&self, instance: &EndpointInstanceId) -> bool {
        self.is_stale_at(instance, Utc::now())
    }

    /// Stale when silent for longer than the threshold at `now`, or never seen
    pub fn is_stale_at(&self, instance: &EndpointInstanceId, now: DateTime<Utc>) -> bool {
        match self.last_seen(instance) {
            // negative elapsed time means the reporter's clock is ahead of ours
            Some(last_seen) => (now - last_seen)
                .to_std()
                .map_or(false, |elapsed| elapsed > self.staleness_threshold),
            None => true,
        }
    }

    /// Last seen strictly before `cutoff`, or never seen
    pub fn is_stale_since(&self, instance: &EndpointInstanceId, cutoff: DateTime<Utc>) -> bool {
        self.last_seen(instance)
            .map_or(true, |last_seen| last_seen < cutoff)
    }

    /// Forget `instance` when it was last seen before `cutoff`.
    ///
    /// Check and removal happen under the map's entry lock, so a concurrent
    /// `record` either lands first and keeps the instance or lands after and
    /// re-adds it. Returns true when the instance was removed.
    pub fn remove_if_silent_since(
        &self,
        instance: &EndpointInstanceId,
        cutoff: DateTime<Utc>,
    ) -> bool {
        self.last_seen
            .remove_if(instance, |_, last_seen| *last_seen < cutoff)
            .is_some()
    }

    /// Last report time of `instance`
    pub fn last_seen(&self, instance: &EndpointInstanceId) -> Option<DateTime<Utc>> {
        self.last_seen.get(instance).map(|entry| *entry.value())
    }

    /// Forget `instance`. Returns true when it was tracked.
    pub fn remove(&self, instance: &EndpointInstanceId) -> bool {
        self.last_seen.remove(instance).is_some()
    }

    /// Every tracked instance
    pub fn tracked_instances(&self) -> Vec<EndpointInstanceId> {
        self.last_seen.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of tracked instances
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

/// Background task purging long-silent instances.
pub struct InstanceSweeper {
    engine: Arc<MonitoringEngine>,
    sweep_interval: Duration,
    retention: Duration,
}

impl InstanceSweeper {
    /// Create a sweeper for `engine`
    pub fn new(
        engine: Arc<MonitoringEngine>,
        sweep_interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            engine,
            sweep_interval,
            retention,
        }
    }

    /// Purge instances silent since before `now - retention`.
    ///
    /// Returns the purged instances. A retention reaching back past the
    /// representable time range expires nothing.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> Vec<EndpointInstanceId> {
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention));
        let Some(cutoff) = cutoff else {
            debug!(retention = ?self.retention, "Retention exceeds the time range, skipping sweep");
            return Vec::new();
        };

        let purged = self.engine.purge_instances_silent_since(cutoff);

        if purged.is_empty() {
            debug!("Sweep found no expired instances");
        } else {
            info!(count = purged.len(), "Purged expired endpoint instances");
        }

        purged
    }

    /// Sweep every `sweep_interval` until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.sweep_interval);
        info!(
            interval = ?self.sweep_interval,
            retention = ?self.retention,
            "Instance sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Instance sweeper stopped");
    }
}
