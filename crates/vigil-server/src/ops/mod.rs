//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness, with the service identity
//! - `/metrics` : Prometheus text format

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use vigil_core::exposition::CONTENT_TYPE;

use crate::app_state::AppState;

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let resource = state.telemetry().registry().resource();
    Json(json!({
        "status": "ok",
        "service": resource.service_name(),
        "version": resource.service_version(),
    }))
}

/// Always 200; collection trouble degrades to partial output.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.telemetry().scrape();
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}
