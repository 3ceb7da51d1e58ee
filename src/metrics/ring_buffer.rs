//! Epoch-indexed ring buffer for one breakdown key
//!
//! Each slot is addressed by `epoch mod ring_size`, where the epoch is the
//! interval index `timestamp / interval_size`. Slots are reused across cycles,
//! so every read and write checks the stored epoch before touching totals.

use crate::metrics::types::{RawEntry, TimeInterval};
use parking_lot::RwLock;

/// Epoch of a slot that was never written. Lower than any real epoch.
const EMPTY_EPOCH: i64 = i64::MIN;

/// One ring-buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementBucket {
    /// Logical interval the totals belong to
    pub epoch: i64,
    /// Sum of values recorded for `epoch`
    pub total_value: i64,
    /// Number of values recorded for `epoch`
    pub total_measurements: i32,
}

impl MeasurementBucket {
    const EMPTY: Self = Self {
        epoch: EMPTY_EPOCH,
        total_value: 0,
        total_measurements: 0,
    };
}

/// Totals read out of a [`Measurement`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalReport {
    /// Intervals, most recent first
    pub intervals: Vec<TimeInterval>,
    /// Sum of values across `intervals`
    pub total_value: i64,
    /// Sum of measurements across `intervals`
    pub total_measurements: i64,
}

/// Ring of epoch buckets guarded by a single reader-writer lock.
///
/// The ring holds twice the number of reported intervals so that a reader
/// walking the window never shares a physical slot with a writer filling the
/// current epoch.
pub struct Measurement {
    buckets: RwLock<Box<[MeasurementBucket]>>,
    ring_size: usize,
    interval_size_ticks: i64,
}

impl Measurement {
    /// Create a ring for `number_of_intervals` reported intervals of
    /// `interval_size_ticks` each
    pub fn new(number_of_intervals: usize, interval_size_ticks: i64) -> Self {
        assert!(number_of_intervals > 0, "Number of intervals must be greater than 0");
        assert!(interval_size_ticks > 0, "Interval size must be greater than 0");

        let ring_size = number_of_intervals * 2;

        Self {
            buckets: RwLock::new(vec![MeasurementBucket::EMPTY; ring_size].into_boxed_slice()),
            ring_size,
            interval_size_ticks,
        }
    }

    /// Physical ring length
    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// Epoch containing the given timestamp
    #[inline]
    pub fn epoch_of(&self, timestamp_ticks: i64) -> i64 {
        timestamp_ticks.div_euclid(self.interval_size_ticks)
    }

    #[inline]
    fn slot_of(&self, epoch: i64) -> usize {
        // ring_size is tiny; the euclidean remainder is always in range
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let slot = epoch.rem_euclid(self.ring_size as i64) as usize;
        slot
    }

    /// Record a batch of entries under the write lock.
    ///
    /// Same epoch accumulates, a newer epoch replaces the slot, an older epoch
    /// is dropped. Returns the number of dropped entries.
    pub fn record(&self, entries: &[RawEntry]) -> usize {
        let mut buckets = self.buckets.write();
        let mut dropped = 0;

        for entry in entries {
            let epoch = self.epoch_of(entry.timestamp_ticks);
            let bucket = &mut buckets[self.slot_of(epoch)];

            if bucket.epoch == epoch {
                bucket.total_value = bucket.total_value.saturating_add(entry.value);
                bucket.total_measurements = bucket.total_measurements.saturating_add(1);
            } else if epoch > bucket.epoch {
                *bucket = MeasurementBucket {
                    epoch,
                    total_value: entry.value,
                    total_measurements: 1,
                };
            } else {
                dropped += 1;
            }
        }

        dropped
    }

    /// Read `count` intervals walking backward from `starting_epoch`.
    ///
    /// Slots holding a different epoch read as empty intervals stamped with the
    /// expected start.
    pub fn report(&self, starting_epoch: i64, count: usize) -> IntervalReport {
        let buckets = self.buckets.read();
        let mut intervals = Vec::with_capacity(count);
        let mut total_value = 0i64;
        let mut total_measurements = 0i64;

        let mut epoch = starting_epoch;
        for _ in 0..count {
            let bucket = &buckets[self.slot_of(epoch)];
            let interval_start = epoch * self.interval_size_ticks;

            if bucket.epoch == epoch {
                total_value = total_value.saturating_add(bucket.total_value);
                total_measurements += i64::from(bucket.total_measurements);
                intervals.push(TimeInterval {
                    interval_start,
                    total_value: bucket.total_value,
                    total_measurements: i64::from(bucket.total_measurements),
                });
            } else {
                intervals.push(TimeInterval {
                    interval_start,
                    total_value: 0,
                    total_measurements: 0,
                });
            }

            epoch -= 1;
        }

        IntervalReport {
            intervals,
            total_value,
            total_measurements,
        }
    }

    /// Copy of the raw slot holding `epoch`, whatever epoch it currently stores
    pub fn bucket_for(&self, epoch: i64) -> MeasurementBucket {
        self.buckets.read()[self.slot_of(epoch)]
    }
}
