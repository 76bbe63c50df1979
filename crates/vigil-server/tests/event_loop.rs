#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use vigil_core::{ErrorKind, LabelSet, Registry, Resource};
use vigil_server::obs::event_loop::{DELAY_P50, DELAY_P90, DELAY_P99};
use vigil_server::obs::{register_delay_gauges, EventLoopDelaySampler};

fn registry() -> Registry {
    Registry::new(Resource::new("orders", "1.0.0", "test").unwrap())
}

#[test]
fn reads_before_enable_are_zero() {
    let s = EventLoopDelaySampler::new(Duration::from_millis(10));
    assert!(!s.is_enabled());
    assert_eq!(s.percentile(99.0), 0.0);
    let p = s.take_percentiles();
    assert_eq!((p.p50, p.p90, p.p99), (0.0, 0.0, 0.0));
}

#[test]
fn enable_outside_runtime_is_a_lifecycle_error() {
    let s = EventLoopDelaySampler::new(Duration::from_millis(10));
    let err = s.enable().expect_err("no runtime");
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
}

#[test]
fn disable_without_enable_is_a_noop() {
    let s = EventLoopDelaySampler::new(Duration::from_millis(10));
    s.disable();
    s.disable();
    assert!(!s.is_enabled());
}

#[test]
fn gauges_stay_silent_until_enabled() {
    let reg = registry();
    let s = Arc::new(EventLoopDelaySampler::new(Duration::from_millis(10)));
    register_delay_gauges(&reg, Arc::clone(&s)).unwrap();

    s.record_delay(Duration::from_millis(5));
    let snap = reg.collect();
    assert!(snap.metric(DELAY_P50).is_none());
    assert!(snap.errors.is_empty());
}

#[test]
fn take_resets_window_and_caches() {
    let s = EventLoopDelaySampler::new(Duration::from_millis(10));
    for ms in 1..=100u64 {
        s.record_delay(Duration::from_millis(ms));
    }
    let p = s.take_percentiles();
    assert_eq!(p.p50, 50.0);
    assert_eq!(p.p90, 90.0);
    assert_eq!(p.p99, 99.0);

    // Window was reset; cached values come back.
    assert_eq!(s.percentile(50.0), 0.0);
    assert_eq!(s.take_percentiles(), p);
    assert_eq!(s.last_percentiles(), p);

    s.record_delay(Duration::from_millis(7));
    let q = s.take_percentiles();
    assert_eq!((q.p50, q.p90, q.p99), (7.0, 7.0, 7.0));
}

#[tokio::test]
async fn percentiles_are_ordered_after_enable() {
    let reg = registry();
    let s = Arc::new(EventLoopDelaySampler::new(Duration::from_millis(1)));
    register_delay_gauges(&reg, Arc::clone(&s)).unwrap();

    s.enable().unwrap();
    s.enable().unwrap();
    assert!(s.is_enabled());

    tokio::time::sleep(Duration::from_millis(50)).await;
    for ms in [1u64, 2, 3, 40] {
        s.record_delay(Duration::from_millis(ms));
    }

    let snap = reg.collect();
    let none = LabelSet::empty();
    let p50 = snap.gauge_value(DELAY_P50, &none).unwrap();
    let p90 = snap.gauge_value(DELAY_P90, &none).unwrap();
    let p99 = snap.gauge_value(DELAY_P99, &none).unwrap();
    assert!(p50 >= 0.0);
    assert!(p50 <= p90, "p50={p50} p90={p90}");
    assert!(p90 <= p99, "p90={p90} p99={p99}");

    s.disable();
    assert!(!s.is_enabled());

    // Drain whatever the task recorded before it stopped; from here on every
    // read is the cached value.
    let cached = s.take_percentiles();
    assert_eq!(s.last_percentiles(), cached);

    let after = reg.collect();
    assert!(after.errors.is_empty());
    assert_eq!(after.gauge_value(DELAY_P50, &none), Some(cached.p50));
    assert_eq!(after.gauge_value(DELAY_P90, &none), Some(cached.p90));
    assert_eq!(after.gauge_value(DELAY_P99, &none), Some(cached.p99));

    let again = reg.collect();
    assert_eq!(again.gauge_value(DELAY_P99, &none), Some(cached.p99));
    s.disable();
}
