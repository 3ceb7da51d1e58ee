//! Reductions from interval snapshots to dashboard series
//!
//! All functions are pure. Inputs are the breakdowns already filtered to the
//! scope being reported (an endpoint, an instance or a message type); points
//! come out ordered by interval start, oldest first.

#![allow(clippy::cast_precision_loss)]

use crate::metrics::types::{HistoryPeriod, IntervalsBreakdown};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregated series of one metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredValues {
    /// Value over the whole window
    pub average: f64,
    /// One value per interval, oldest first
    pub points: Vec<f64>,
}

impl MonitoredValues {
    /// Most recent point, 0 when there is none
    pub fn latest(&self) -> f64 {
        self.points.last().copied().unwrap_or_default()
    }
}

/// Signature shared by all reductions
pub type Aggregation<K> = fn(&[&IntervalsBreakdown<K>], HistoryPeriod) -> MonitoredValues;

/// Names one of the reductions below, independent of the breakdown key type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// [`to_averages`]
    Averages,
    /// [`to_rounded_sum_of_breakdown_averages`]
    RoundedSumOfBreakdownAverages,
    /// [`to_total_measurements_per_second`]
    TotalMeasurementsPerSecond,
}

impl Reduction {
    /// The reduction function for key type `K`
    pub fn function<K>(self) -> Aggregation<K> {
        match self {
            Reduction::Averages => to_averages,
            Reduction::RoundedSumOfBreakdownAverages => to_rounded_sum_of_breakdown_averages,
            Reduction::TotalMeasurementsPerSecond => to_total_measurements_per_second,
        }
    }

    /// Apply the reduction
    pub fn apply<K>(
        self,
        breakdowns: &[&IntervalsBreakdown<K>],
        period: HistoryPeriod,
    ) -> MonitoredValues {
        (self.function())(breakdowns, period)
    }
}

#[inline]
fn zero_safe_ratio(total_value: i64, total_measurements: i64) -> f64 {
    total_value as f64 / total_measurements.max(1) as f64
}

/// Sum (value, measurements) per interval start across breakdowns
fn totals_by_interval<K>(breakdowns: &[&IntervalsBreakdown<K>]) -> BTreeMap<i64, (i64, i64)> {
    let mut grouped = BTreeMap::new();
    for breakdown in breakdowns {
        for interval in &breakdown.intervals {
            let totals: &mut (i64, i64) = grouped.entry(interval.interval_start).or_default();
            totals.0 += interval.total_value;
            totals.1 += interval.total_measurements;
        }
    }
    grouped
}

/// Pooled average: total value over total measurements, per interval and overall
pub fn to_averages<K>(
    breakdowns: &[&IntervalsBreakdown<K>],
    _period: HistoryPeriod,
) -> MonitoredValues {
    let total_value: i64 = breakdowns.iter().map(|b| b.total_value).sum();
    let total_measurements: i64 = breakdowns.iter().map(|b| b.total_measurements).sum();

    let points = totals_by_interval(breakdowns)
        .into_values()
        .map(|(value, measurements)| zero_safe_ratio(value, measurements))
        .collect();

    MonitoredValues {
        average: zero_safe_ratio(total_value, total_measurements),
        points,
    }
}

/// Sum of each breakdown's own average, rounded.
///
/// Used for gauges such as queue length, where every breakdown observes a
/// separate queue and the totals must add up rather than pool.
pub fn to_rounded_sum_of_breakdown_averages<K>(
    breakdowns: &[&IntervalsBreakdown<K>],
    _period: HistoryPeriod,
) -> MonitoredValues {
    let average: f64 = breakdowns
        .iter()
        .map(|b| zero_safe_ratio(b.total_value, b.total_measurements))
        .sum();

    let mut per_interval: BTreeMap<i64, f64> = BTreeMap::new();
    for breakdown in breakdowns {
        for interval in &breakdown.intervals {
            *per_interval.entry(interval.interval_start).or_default() +=
                zero_safe_ratio(interval.total_value, interval.total_measurements);
        }
    }

    MonitoredValues {
        average: average.round(),
        points: per_interval.into_values().map(f64::round).collect(),
    }
}

/// Number of measurements per second of interval time
pub fn to_total_measurements_per_second<K>(
    breakdowns: &[&IntervalsBreakdown<K>],
    period: HistoryPeriod,
) -> MonitoredValues {
    let seconds = period.interval_seconds();
    let total_measurements: i64 = breakdowns.iter().map(|b| b.total_measurements).sum();

    let points = totals_by_interval(breakdowns)
        .into_values()
        .map(|(_, measurements)| measurements as f64 / seconds)
        .collect();

    MonitoredValues {
        average: total_measurements as f64 / (seconds * period.number_of_intervals() as f64),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::TimeInterval;

    fn breakdown(id: &str, intervals: &[(i64, i64, i64)]) -> IntervalsBreakdown<String> {
        let intervals: Vec<TimeInterval> = intervals
            .iter()
            .map(|&(interval_start, total_value, total_measurements)| TimeInterval {
                interval_start,
                total_value,
                total_measurements,
            })
            .collect();

        IntervalsBreakdown {
            id: id.to_owned(),
            total_value: intervals.iter().map(|i| i.total_value).sum(),
            total_measurements: intervals.iter().map(|i| i.total_measurements).sum(),
            intervals,
        }
    }

    #[test]
    fn test_averages_pool_breakdowns() {
        let a = breakdown("a", &[(2, 10, 1), (1, 30, 3)]);
        let b = breakdown("b", &[(2, 20, 1), (1, 0, 0)]);

        let values = to_averages(&[&a, &b], HistoryPeriod::ONE_MINUTE);

        assert_eq!(values.average, 60.0 / 5.0);
        // oldest first
        assert_eq!(values.points, vec![10.0, 15.0]);
        assert_eq!(values.latest(), 15.0);
    }

    #[test]
    fn test_averages_zero_measurements() {
        let empty = breakdown("a", &[(1, 0, 0), (2, 0, 0)]);
        let values = to_averages(&[&empty], HistoryPeriod::ONE_MINUTE);

        assert_eq!(values.average, 0.0);
        assert!(values.points.iter().all(|p| *p == 0.0 && p.is_finite()));
    }

    #[test]
    fn test_no_breakdowns() {
        let values = to_averages::<String>(&[], HistoryPeriod::ONE_MINUTE);
        assert_eq!(values, MonitoredValues::default());
        assert_eq!(values.latest(), 0.0);
    }

    #[test]
    fn test_rounded_sum_does_not_pool() {
        // one busy observer reporting 2, one quiet observer reporting 10
        let busy = breakdown("busy", &[(1, 200, 100)]);
        let quiet = breakdown("quiet", &[(1, 10, 1)]);

        let values =
            to_rounded_sum_of_breakdown_averages(&[&busy, &quiet], HistoryPeriod::ONE_MINUTE);

        assert_eq!(values.average, 12.0);
        assert_eq!(values.points, vec![12.0]);
    }

    #[test]
    fn test_rounded_sum_rounds() {
        let a = breakdown("a", &[(1, 5, 2), (2, 0, 0)]);
        let values = to_rounded_sum_of_breakdown_averages(&[&a], HistoryPeriod::ONE_MINUTE);

        assert_eq!(values.average, 3.0);
        assert_eq!(values.points, vec![3.0, 0.0]);
    }

    #[test]
    fn test_per_second_rate() {
        let a = breakdown("a", &[(1, 0, 10), (2, 0, 5)]);
        let b = breakdown("b", &[(1, 0, 5)]);

        let values = to_total_measurements_per_second(&[&a, &b], HistoryPeriod::FIVE_MINUTES);

        assert_eq!(values.points, vec![3.0, 1.0]);
        assert!((values.average - 20.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn test_reduction_dispatch() {
        let a = breakdown("a", &[(1, 9, 2)]);
        let period = HistoryPeriod::ONE_MINUTE;

        assert_eq!(Reduction::Averages.apply(&[&a], period), to_averages(&[&a], period));
        assert_eq!(
            Reduction::RoundedSumOfBreakdownAverages.apply(&[&a], period).average,
            5.0
        );
        assert_eq!(Reduction::TotalMeasurementsPerSecond.apply(&[&a], period).points, vec![2.0]);
    }
}
