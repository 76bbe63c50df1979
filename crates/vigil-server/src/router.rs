//! Axum router wiring for the ops listener.

use axum::{routing::get, Router};

use crate::{app_state::AppState, hooks, ops};

/// `/healthz` and `/metrics`, passed through the request hooks when request
/// metrics are enabled. Both paths are on the default ignore list, so only a
/// custom list makes them show up.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics));

    let router = match state.telemetry().requests() {
        Some(m) => hooks::instrument(router, std::sync::Arc::clone(m)),
        None => router,
    };
    router.with_state(state)
}
