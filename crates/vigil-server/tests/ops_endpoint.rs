#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::Path,
    http::{header, Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tower::ServiceExt;

use vigil_core::exposition::{CONTENT_TYPE, NO_METRICS_PLACEHOLDER};
use vigil_core::gc::{GcPauseEvent, ManualPauseSource};
use vigil_server::app_state::AppState;
use vigil_server::config::{self, VigilConfig};
use vigil_server::hooks::{self, OperationName, RequestFailure};
use vigil_server::{router, Telemetry};

fn cfg(extra: &str) -> VigilConfig {
    let s = format!("version: 1\nservice: {{ name: orders, version: \"1.0.0\" }}\n{extra}");
    config::load_from_str(&s).unwrap()
}

async fn scrape(app: Router) -> (StatusCode, String, String) {
    let res = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let ct = res
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, ct, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn empty_registry_serves_placeholder() {
    let state = AppState::new(cfg("")).unwrap();
    let (status, ct, body) = scrape(router::build_router(state)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ct, CONTENT_TYPE);
    assert_eq!(body.trim_end(), NO_METRICS_PLACEHOLDER);
}

#[tokio::test]
async fn liveness_and_scrapes_are_not_counted() {
    let state = AppState::new(cfg("")).unwrap();
    let app = router::build_router(state.clone());

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let health: serde_json::Value =
        serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "orders");

    let (_, _, body) = scrape(app.clone()).await;
    assert_eq!(body.trim_end(), NO_METRICS_PLACEHOLDER);
    let (_, _, body) = scrape(app).await;
    assert_eq!(body.trim_end(), NO_METRICS_PLACEHOLDER);
}

#[tokio::test]
async fn unmatched_paths_share_one_series() {
    let state = AppState::new(cfg("")).unwrap();
    let metrics = Arc::clone(state.telemetry().requests().unwrap());
    let app = hooks::instrument(Router::new().route("/widgets/:id", get(widget)), metrics);

    for n in 0..5 {
        let res = app
            .clone()
            .oneshot(Request::builder().uri(format!("/scan/{n}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    let (_, _, body) = scrape(router::build_router(state)).await;
    assert!(!body.contains("/scan/"));
    assert!(body.contains(
        "http_request_count_total{method=\"GET\",route=\"UNDEFINED\",statusCode=\"404\"} 5"
    ));
    assert!(body.contains(
        "http_error_count_total{error_type=\"client_error\",method=\"GET\",route=\"UNDEFINED\",statusCode=\"404\"} 5"
    ));
}

async fn widget(Path(id): Path<u32>) -> axum::response::Response {
    match id {
        0 => {
            let mut res = (StatusCode::NOT_FOUND, "missing").into_response();
            res.extensions_mut().insert(RequestFailure::default());
            res
        }
        13 => {
            let mut res = StatusCode::OK.into_response();
            res.extensions_mut().insert(RequestFailure { status: Some(503) });
            res
        }
        _ => {
            let mut res = "widget".into_response();
            res.extensions_mut()
                .insert(OperationName("GetWidget".to_string()));
            res
        }
    }
}

#[tokio::test]
async fn instrumented_routes_use_the_template() {
    let state = AppState::new(cfg("")).unwrap();
    let metrics = Arc::clone(state.telemetry().requests().unwrap());
    let app = hooks::instrument(Router::new().route("/widgets/:id", get(widget)), metrics);

    for uri in ["/widgets/1", "/widgets/2", "/widgets/0", "/widgets/13"] {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
    }

    let (_, _, body) = scrape(router::build_router(state)).await;
    assert!(body.contains(
        "http_request_count_total{method=\"GET\",operationName=\"GetWidget\",route=\"/widgets/:id\",statusCode=\"200\"} 2"
    ));
    assert!(body.contains(
        "http_error_count_total{error_type=\"client_error\",method=\"GET\",route=\"/widgets/:id\",statusCode=\"404\"} 1"
    ));
    assert!(body.contains(
        "http_error_count_total{error_type=\"server_error\",method=\"GET\",route=\"/widgets/:id\",statusCode=\"503\"} 1"
    ));
    assert!(!body.contains("/widgets/1"));
    assert!(body.contains("# TYPE http_request_duration_ms histogram"));
    assert!(body.contains("target_info{"));
    assert!(body.contains("service_name=\"orders\""));
}

#[tokio::test]
async fn user_view_overrides_duration_buckets() {
    let state = AppState::new(cfg(
        "metrics:\n  views:\n    - instrument: http_request_duration_ms\n      boundaries: [5, 500]\n",
    ))
    .unwrap();
    let m = state.telemetry().requests().unwrap();

    m.on_response(&vigil_server::hooks::RequestInfo {
        method: "GET",
        matched_route: Some("/a"),
        status_code: 200,
        elapsed: Duration::from_millis(120),
        ..Default::default()
    });
    let (_, _, body) = scrape(router::build_router(state.clone())).await;
    assert!(body.contains("le=\"500\"} 1"));
    assert!(!body.contains("le=\"250\""));
}

#[tokio::test]
async fn suppressed_defaults_register_nothing() {
    let t = Telemetry::new(&cfg("metrics: { suppress_default_metrics: true }\n")).unwrap();
    assert!(t.requests().is_none());
    assert!(t.event_loop().is_none());
    assert!(t.gc().is_none());
    t.start().unwrap();
    assert_eq!(t.scrape().trim_end(), NO_METRICS_PLACEHOLDER);
    t.shutdown();
}

#[tokio::test]
async fn suppressed_advanced_keeps_request_metrics_only() {
    let t = Telemetry::new(&cfg("metrics: { suppress_advanced_metrics: true }\n")).unwrap();
    assert!(t.requests().is_some());
    assert!(t.event_loop().is_none());
    assert!(t.active_resources().is_none());
    assert!(t.gc().is_none());
}

#[tokio::test]
async fn start_wires_samplers_and_gc_source() {
    let source = Arc::new(ManualPauseSource::new());
    let t = Telemetry::new(&cfg("")).unwrap().with_gc_source(source.clone());
    t.start().unwrap();

    assert!(t.event_loop().unwrap().is_enabled());
    assert!(t.active_resources().unwrap().is_attached());
    assert!(source.is_subscribed());

    source.emit(GcPauseEvent {
        duration: Duration::from_millis(3),
        kind: 4,
        flags: 4,
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let body = t.scrape();
    assert!(body.contains("runtime_gc_duration_ms_count{flag=\"FORCED\",kind=\"MAJOR\"} 1"));
    assert!(body.contains("runtime_active_resources_by_type_count{type=\"workers\"}"));
    assert!(body.contains("# TYPE runtime_event_loop_delay_p99_ms gauge"));

    t.shutdown();
    assert!(!t.event_loop().unwrap().is_enabled());
    assert!(!source.is_subscribed());
    t.shutdown();
}
