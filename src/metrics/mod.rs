//! Ring-buffer time series at several granularities.
//!
//! Design targets:
//! - Per-key locking so unrelated reporters never contend
//! - Out-of-order writes can accumulate into a live bucket but never clobber
//!   a newer one
//! - Reads touch a fixed number of buckets regardless of history length

pub mod aggregator;
pub mod ring_buffer;
pub mod storage;
pub mod types;

pub use aggregator::{Aggregation, MonitoredValues, Reduction};
pub use ring_buffer::{Measurement, MeasurementBucket};
pub use storage::{IntervalsStore, MetricStore, QueueLengthStore, VariableHistoryStore};
pub use types::{
    duration_ticks, ticks_from_datetime, ticks_to_datetime, HistoryPeriod, IntervalsBreakdown,
    RawEntry, TimeInterval, NUMBER_OF_INTERVALS, TICKS_PER_SECOND,
};
