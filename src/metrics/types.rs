//! Core metric types shared by the stores and the aggregator.
//!
//! Time is carried as `i64` ticks (100 ns units since the Unix epoch) on the
//! hot path; `chrono` types only appear at the edges.

use crate::core::{MonitorError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Number of 100 ns ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Every history window is divided into this many intervals.
pub const NUMBER_OF_INTERVALS: usize = 60;

/// Converts a UTC timestamp into ticks.
pub fn ticks_from_datetime(at: DateTime<Utc>) -> i64 {
    at.timestamp() * TICKS_PER_SECOND + i64::from(at.timestamp_subsec_nanos() / 100)
}

/// Converts ticks back into a UTC timestamp.
pub fn ticks_to_datetime(ticks: i64) -> DateTime<Utc> {
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    #[allow(clippy::cast_possible_truncation)]
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/// Length of a duration in ticks.
pub fn duration_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX)
}

/// One measurement sample as decoded from a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry {
    /// When the sample was taken, in ticks
    pub timestamp_ticks: i64,
    /// Sample value (milliseconds for durations, item count for queues)
    pub value: i64,
}

impl RawEntry {
    /// Create an entry from raw ticks
    pub fn new(timestamp_ticks: i64, value: i64) -> Self {
        Self {
            timestamp_ticks,
            value,
        }
    }

    /// Create an entry stamped with a UTC timestamp
    pub fn at(timestamp: DateTime<Utc>, value: i64) -> Self {
        Self::new(ticks_from_datetime(timestamp), value)
    }
}

/// Totals of one bucket as seen by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    /// Start of the interval, in ticks
    pub interval_start: i64,
    /// Sum of the values that landed in the interval
    pub total_value: i64,
    /// Number of values that landed in the interval
    pub total_measurements: i64,
}

impl TimeInterval {
    /// Start of the interval as a UTC timestamp
    pub fn start_time(&self) -> DateTime<Utc> {
        ticks_to_datetime(self.interval_start)
    }
}

/// Read-side snapshot of the last N intervals of one breakdown key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalsBreakdown<K> {
    /// The breakdown key the intervals belong to
    pub id: K,
    /// Intervals, most recent first
    pub intervals: Vec<TimeInterval>,
    /// Sum of `total_value` across `intervals`
    pub total_value: i64,
    /// Sum of `total_measurements` across `intervals`
    pub total_measurements: i64,
}

/// One of the six supported query windows.
///
/// Values can only come from [`HistoryPeriod::ALL`], so every period handed
/// to a store is one the store was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryPeriod {
    minutes: u32,
    delayed_intervals: usize,
    index: usize,
}

impl HistoryPeriod {
    /// 1 minute window, 1 s intervals
    pub const ONE_MINUTE: Self = Self::fixed(0, 1, 2);
    /// 5 minute window, 5 s intervals
    pub const FIVE_MINUTES: Self = Self::fixed(1, 5, 1);
    /// 10 minute window, 10 s intervals
    pub const TEN_MINUTES: Self = Self::fixed(2, 10, 1);
    /// 15 minute window, 15 s intervals
    pub const FIFTEEN_MINUTES: Self = Self::fixed(3, 15, 1);
    /// 30 minute window, 30 s intervals
    pub const THIRTY_MINUTES: Self = Self::fixed(4, 30, 1);
    /// 60 minute window, 1 min intervals
    pub const SIXTY_MINUTES: Self = Self::fixed(5, 60, 1);

    /// Every supported period, shortest first
    pub const ALL: [HistoryPeriod; 6] = [
        Self::ONE_MINUTE,
        Self::FIVE_MINUTES,
        Self::TEN_MINUTES,
        Self::FIFTEEN_MINUTES,
        Self::THIRTY_MINUTES,
        Self::SIXTY_MINUTES,
    ];

    const fn fixed(index: usize, minutes: u32, delayed_intervals: usize) -> Self {
        Self {
            minutes,
            delayed_intervals,
            index,
        }
    }

    /// Look up the period with the given window length
    pub fn from_minutes(minutes: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|period| period.minutes == minutes)
            .ok_or(MonitorError::UnsupportedHistoryPeriod { minutes })
    }

    /// Window length in minutes
    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Full window length
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.minutes) * 60)
    }

    /// Number of intervals in the window
    pub fn number_of_intervals(&self) -> usize {
        NUMBER_OF_INTERVALS
    }

    /// How many intervals a read lags behind `now`
    pub fn delayed_intervals(&self) -> usize {
        self.delayed_intervals
    }

    /// Length of one interval
    pub fn interval_size(&self) -> Duration {
        // window / 60 == one second per window minute
        Duration::from_secs(u64::from(self.minutes))
    }

    /// Length of one interval in ticks
    pub fn interval_size_ticks(&self) -> i64 {
        i64::from(self.minutes) * TICKS_PER_SECOND
    }

    /// Length of one interval in seconds
    pub fn interval_seconds(&self) -> f64 {
        f64::from(self.minutes)
    }

    /// Position inside [`HistoryPeriod::ALL`]
    pub(crate) fn index(&self) -> usize {
        self.index
    }
}
