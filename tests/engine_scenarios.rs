//! End-to-end scenarios: reports in, dashboard payloads out.

mod common;

use chrono::Duration as ChronoDuration;
use common::{t0, Harness, TestReportBuilder};
use pretty_assertions::assert_eq;
use pulsegrid_lib::breakdown::EndpointInstanceId;
use pulsegrid_lib::metrics::{HistoryPeriod, RawEntry, TICKS_PER_SECOND};
use pulsegrid_lib::monitoring::InstanceSweeper;
use pulsegrid_lib::receiver::Report;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_all_windows_see_one_report() {
    let harness = Harness::new();
    let sample_at = t0() - ChronoDuration::minutes(3);

    let report = TestReportBuilder::new("Sales", "s1")
        .at(sample_at)
        .values(&[40, 60])
        .processing_time();
    harness.receiver.handle(report, t0());

    for period in HistoryPeriod::ALL {
        let endpoints = harness.query.endpoints(period, t0());
        let processing = &endpoints[0].metrics["ProcessingTime"];

        if period.minutes() == 1 {
            // three minutes back is outside the one minute window
            assert_eq!(processing.average, 0.0, "window {}", period.minutes());
        } else {
            assert_eq!(processing.average, 50.0, "window {}", period.minutes());
        }
        assert_eq!(processing.points.len(), period.number_of_intervals());
    }
}

#[test]
fn test_current_interval_is_not_reported() {
    let harness = Harness::new();

    harness
        .receiver
        .handle(TestReportBuilder::new("Sales", "s1").at(t0()).processing_time(), t0());

    let endpoints = harness.query.endpoints(HistoryPeriod::FIVE_MINUTES, t0());
    assert_eq!(endpoints[0].metrics["Throughput"].average, 0.0);

    // once the interval has settled it shows up
    let later = t0() + ChronoDuration::seconds(10);
    let endpoints = harness.query.endpoints(HistoryPeriod::FIVE_MINUTES, later);
    assert!(endpoints[0].metrics["Throughput"].average > 0.0);
}

#[test]
fn test_queue_lengths_add_up_across_queues() {
    let harness = Harness::new();
    let at = t0() - ChronoDuration::seconds(30);

    let busy = TestReportBuilder::new("Sales", "s1")
        .at(at)
        .values(&[2, 2, 2, 2])
        .queue_length("sales");
    harness.receiver.handle(busy, t0());
    let retries = TestReportBuilder::new("Sales", "s2")
        .at(at)
        .values(&[10])
        .queue_length("sales.retries");
    harness.receiver.handle(retries, t0());

    let details = harness.query.endpoint_details("Sales", HistoryPeriod::FIVE_MINUTES, t0());

    assert_eq!(details.digest["QueueLength"].average, 12.0);
    assert_eq!(harness.engine.input_queues().get_for_endpoint_name("Sales").len(), 2);
}

#[test]
fn test_retries_and_throughput_rates() {
    let harness = Harness::new();
    let at = t0() - ChronoDuration::seconds(30);

    harness
        .receiver
        .handle(TestReportBuilder::new("Sales", "s1").at(at).values(&[1; 30]).retries(), t0());
    let report = TestReportBuilder::new("Sales", "s1")
        .at(at)
        .values(&[5; 60])
        .processing_time();
    harness.receiver.handle(report, t0());

    let details = harness.query.endpoint_details("Sales", HistoryPeriod::FIVE_MINUTES, t0());

    // 60 intervals of 5 seconds
    assert!((details.digest["Retries"].average - 30.0 / 300.0).abs() < 1e-9);
    assert!((details.digest["Throughput"].average - 60.0 / 300.0).abs() < 1e-9);
    assert_eq!(details.digest["ProcessingTime"].average, 5.0);
}

#[test]
fn test_message_type_breakdown() {
    let harness = Harness::new();
    let at = t0() - ChronoDuration::seconds(30);
    let order = "Shop.PlaceOrder, Shop.Messages, Version=3.1.0.0, \
                 Culture=neutral, PublicKeyToken=null";
    let cancel = "Shop.CancelOrder, Shop.Messages, Version=3.1.0.0, \
                  Culture=neutral, PublicKeyToken=null";

    for (message_type, value) in [(order, 100), (order, 200), (cancel, 900)] {
        harness.receiver.handle(
            TestReportBuilder::new("Sales", "s1")
                .at(at)
                .message_type(message_type)
                .values(&[value])
                .critical_time(),
            t0(),
        );
    }

    let details = harness.query.endpoint_details("Sales", HistoryPeriod::FIVE_MINUTES, t0());
    let mut message_types: Vec<(String, f64)> = details
        .message_types
        .iter()
        .map(|m| (m.descriptor.type_name.clone(), m.metrics["CriticalTime"].average))
        .collect();
    message_types.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        message_types,
        vec![("Shop.CancelOrder".to_owned(), 900.0), ("Shop.PlaceOrder".to_owned(), 150.0)]
    );
    assert_eq!(details.digest["CriticalTime"].average, 400.0);
}

#[test]
fn test_stale_and_disconnected_endpoints() {
    let harness = Harness::new();

    harness.receiver.handle(TestReportBuilder::new("Sales", "s1").heartbeat(), t0());
    harness.receiver.handle(TestReportBuilder::new("Billing", "b1").heartbeat(), t0());

    let later = t0() + ChronoDuration::seconds(30);
    harness.receiver.handle(TestReportBuilder::new("Sales", "s1").heartbeat(), later);

    // Billing silent for 50s, Sales for 20s
    let now = t0() + ChronoDuration::seconds(50);
    let endpoints = harness.query.endpoints(HistoryPeriod::ONE_MINUTE, now);
    let stale: Vec<(&str, bool)> =
        endpoints.iter().map(|e| (e.name.as_str(), e.is_stale)).collect();

    assert_eq!(stale, vec![("Billing", true), ("Sales", false)]);
    assert_eq!(harness.query.disconnected_count(now), 1);
    assert_eq!(harness.query.connected_count(now), 1);
}

#[test]
fn test_sweeper_forgets_expired_instances() {
    let harness = Harness::new();
    harness.receiver.handle(TestReportBuilder::new("Sales", "old").heartbeat(), t0());
    harness.receiver.handle(
        TestReportBuilder::new("Sales", "new").heartbeat(),
        t0() + ChronoDuration::minutes(50),
    );

    let sweeper = InstanceSweeper::new(
        Arc::clone(&harness.engine),
        Duration::from_secs(30),
        Duration::from_secs(3600),
    );
    let purged = sweeper.sweep_once(t0() + ChronoDuration::minutes(61));

    assert_eq!(purged, vec![EndpointInstanceId::new("Sales", "old")]);
    let endpoints = harness
        .query
        .endpoints(HistoryPeriod::ONE_MINUTE, t0() + ChronoDuration::minutes(61));
    assert_eq!(endpoints[0].endpoint_instance_ids, vec!["new".to_owned()]);
}

#[test]
fn test_concurrent_reporters() {
    let harness = Harness::new();
    let at = t0() - ChronoDuration::seconds(30);

    let handles: Vec<_> = (0..8)
        .map(|thread_index| {
            let receiver = Arc::clone(&harness.receiver);
            thread::spawn(move || {
                for i in 0..250 {
                    let instance = EndpointInstanceId::new(
                        format!("Endpoint{}", thread_index % 4),
                        format!("i{thread_index}"),
                    );
                    let report = Report::TaggedDurations {
                        instance,
                        metric: pulsegrid_lib::receiver::DurationMetric::ProcessingTime,
                        message_type: None,
                        entries: vec![RawEntry::at(at, i % 10)],
                    };
                    receiver.handle(report, t0());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(harness.receiver.reports_handled(), 2000);
    assert_eq!(harness.engine.endpoints().len(), 8);

    let endpoints = harness.query.endpoints(HistoryPeriod::FIVE_MINUTES, t0());
    assert_eq!(endpoints.len(), 4);

    let per_second: f64 = endpoints.iter().map(|e| e.metrics["Throughput"].average).sum();
    assert!((per_second - 2000.0 / 300.0).abs() < 1e-9);
}

#[test]
fn test_out_of_order_batches_do_not_clobber() {
    let harness = Harness::new();
    let instance = EndpointInstanceId::new("Sales", "s1");
    let period = HistoryPeriod::ONE_MINUTE;
    let now = t0();

    // exactly one ring length apart: same slot, different epochs
    let ring_span = ChronoDuration::seconds(2 * period.number_of_intervals() as i64);
    let recent = now - ChronoDuration::seconds(10);
    let ancient = recent - ring_span;

    for at in [recent, ancient] {
        harness.receiver.handle(
            Report::TaggedDurations {
                instance: instance.clone(),
                metric: pulsegrid_lib::receiver::DurationMetric::ProcessingTime,
                message_type: None,
                entries: vec![RawEntry::at(at, if at == recent { 7 } else { 1_000 })],
            },
            now,
        );
    }

    let breakdowns = harness.engine.processing_time().instance_intervals(period, now);
    let recent_start = recent.timestamp() * TICKS_PER_SECOND;
    let interval = breakdowns[0]
        .intervals
        .iter()
        .find(|i| i.interval_start == recent_start)
        .unwrap();

    assert_eq!(interval.total_value, 7);
    assert_eq!(breakdowns[0].total_value, 7);
}
