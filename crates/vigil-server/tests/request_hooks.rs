#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use vigil_core::exposition;
use vigil_core::{LabelSet, Registry, Resource};
use vigil_server::hooks::request::{ERROR_COUNT, REQUEST_COUNT, REQUEST_DURATION};
use vigil_server::hooks::{ErrorType, IgnorePolicy, RequestInfo, RequestMetrics};

fn setup(ignore: IgnorePolicy) -> (Registry, RequestMetrics) {
    let reg = Registry::new(Resource::new("orders", "1.0.0", "test").unwrap());
    let m = RequestMetrics::register(&reg, ignore).unwrap();
    (reg, m)
}

fn req<'a>(method: &'a str, route: &'a str, status: u16, ms: u64) -> RequestInfo<'a> {
    RequestInfo {
        method,
        matched_route: Some(route),
        raw_path: None,
        status_code: status,
        elapsed: Duration::from_millis(ms),
        operation_name: None,
    }
}

fn labels(pairs: &[(&str, &str)]) -> LabelSet {
    LabelSet::from(pairs)
}

#[test]
fn response_lands_in_250_bucket_and_counts_once() {
    let (reg, m) = setup(IgnorePolicy::default());
    m.on_response(&req("GET", "/widgets", 200, 120));

    let snap = reg.collect();
    let l = labels(&[("method", "GET"), ("route", "/widgets"), ("statusCode", "200")]);
    assert_eq!(snap.counter_value(REQUEST_COUNT, &l), Some(1));

    let p = snap.histogram_point(REQUEST_DURATION, &l).unwrap();
    assert_eq!(p.count, 1);
    assert!((p.sum - 120.0).abs() < 1e-9);

    let text = exposition::serialize(&snap);
    assert!(text.contains(
        "http_request_duration_ms_bucket{method=\"GET\",route=\"/widgets\",statusCode=\"200\",le=\"100\"} 0"
    ));
    assert!(text.contains(
        "http_request_duration_ms_bucket{method=\"GET\",route=\"/widgets\",statusCode=\"200\",le=\"250\"} 1"
    ));
    assert!(text.contains(
        "http_request_count_total{method=\"GET\",route=\"/widgets\",statusCode=\"200\"} 1"
    ));
}

#[test]
fn ignored_routes_record_nothing() {
    let policy = IgnorePolicy::new(["/favicon.ico", "/metrics"], Some("^/internal/")).unwrap();
    let (reg, m) = setup(policy);

    m.on_response(&req("GET", "/metrics", 200, 5));
    m.on_response(&req("GET", "/favicon.ico", 404, 1));
    m.on_error(&req("GET", "/favicon.ico", 404, 1), None);
    m.on_response(&req("GET", "/internal/debug", 200, 3));

    let snap = reg.collect();
    assert!(snap.is_empty());
    assert_eq!(
        exposition::serialize_or_placeholder(&snap).trim_end(),
        exposition::NO_METRICS_PLACEHOLDER
    );
}

#[test]
fn default_policy_ignores_infrastructure_paths() {
    let p = IgnorePolicy::default();
    for path in ["/favicon.ico", "/alivez", "/versionz", "/metrics", "/health"] {
        assert!(p.is_ignored(path), "{path} should be ignored");
    }
    assert!(!p.is_ignored("/widgets"));
    assert!(!p.is_ignored("/metrics/extra"));
}

#[test]
fn invalid_ignore_pattern_is_a_config_error() {
    assert!(IgnorePolicy::new(Vec::<String>::new(), Some("([")).is_err());
}

#[test]
fn error_type_follows_status_class() {
    let (reg, m) = setup(IgnorePolicy::default());
    m.on_error(&req("POST", "/widgets", 503, 10), None);
    m.on_error(&req("POST", "/widgets", 404, 10), None);

    let snap = reg.collect();
    let server = labels(&[
        ("method", "POST"),
        ("route", "/widgets"),
        ("statusCode", "503"),
        ("error_type", "server_error"),
    ]);
    let client = labels(&[
        ("method", "POST"),
        ("route", "/widgets"),
        ("statusCode", "404"),
        ("error_type", "client_error"),
    ]);
    assert_eq!(snap.counter_value(ERROR_COUNT, &server), Some(1));
    assert_eq!(snap.counter_value(ERROR_COUNT, &client), Some(1));

    assert_eq!(ErrorType::from_status(500), ErrorType::ServerError);
    assert_eq!(ErrorType::from_status(499), ErrorType::ClientError);
    assert_eq!(ErrorType::from_status(302), ErrorType::ServerError);
}

#[test]
fn error_status_overrides_response_status() {
    let (reg, m) = setup(IgnorePolicy::default());
    m.on_error(&req("GET", "/widgets", 200, 10), Some(502));

    let snap = reg.collect();
    let l = labels(&[
        ("method", "GET"),
        ("route", "/widgets"),
        ("statusCode", "502"),
        ("error_type", "server_error"),
    ]);
    assert_eq!(snap.counter_value(ERROR_COUNT, &l), Some(1));
}

#[test]
fn operation_name_becomes_a_label() {
    let (reg, m) = setup(IgnorePolicy::default());
    let mut info = req("POST", "/graphql", 200, 10);
    info.operation_name = Some("ListWidgets");
    m.on_response(&info);
    m.on_error(&info, Some(500));

    let snap = reg.collect();
    let l = labels(&[
        ("method", "POST"),
        ("route", "/graphql"),
        ("statusCode", "200"),
        ("operationName", "ListWidgets"),
    ]);
    assert_eq!(snap.counter_value(REQUEST_COUNT, &l), Some(1));

    let e = labels(&[
        ("method", "POST"),
        ("route", "/graphql"),
        ("statusCode", "500"),
        ("operationName", "ListWidgets"),
        ("error_type", "server_error"),
    ]);
    assert_eq!(snap.counter_value(ERROR_COUNT, &e), Some(1));
}

#[test]
fn malformed_metadata_skips_the_write() {
    let (reg, m) = setup(IgnorePolicy::default());
    m.on_response(&req("", "/widgets", 200, 10));
    m.on_response(&req("GET", "/widgets", 0, 10));
    m.on_response(&req("GET", "/widgets", 999, 10));
    m.on_error(&req("GET", "/widgets", 200, 10), Some(1000));

    assert!(reg.collect().is_empty());
}

#[test]
fn effective_route_prefers_template() {
    let r = RequestInfo {
        method: "GET",
        matched_route: Some("/widgets/:id"),
        raw_path: Some("/widgets/42"),
        ..Default::default()
    };
    assert_eq!(r.effective_route(), "/widgets/:id");

    let r = RequestInfo {
        method: "GET",
        matched_route: None,
        raw_path: Some("/widgets/42"),
        ..Default::default()
    };
    assert_eq!(r.effective_route(), "/widgets/42");

    let r = RequestInfo {
        method: "GET",
        ..Default::default()
    };
    assert_eq!(r.effective_route(), "UNDEFINED");
}

#[test]
fn counts_accumulate_per_label_set() {
    let (reg, m) = setup(IgnorePolicy::default());
    for _ in 0..3 {
        m.on_response(&req("GET", "/widgets", 200, 10));
    }
    m.on_response(&req("GET", "/widgets", 201, 10));

    let snap = reg.collect();
    let ok = labels(&[("method", "GET"), ("route", "/widgets"), ("statusCode", "200")]);
    let created = labels(&[("method", "GET"), ("route", "/widgets"), ("statusCode", "201")]);
    assert_eq!(snap.counter_value(REQUEST_COUNT, &ok), Some(3));
    assert_eq!(snap.counter_value(REQUEST_COUNT, &created), Some(1));
    assert_eq!(snap.histogram_point(REQUEST_DURATION, &ok).unwrap().count, 3);
}
