//! axum integration of the request hook adapter.
//!
//! `track_requests` wraps every route: it captures method and matched route
//! template before the handler runs, then reports the response
//! (and, for failures, the error) to [`RequestMetrics`].
//!
//! Handlers signal failures and operation names through response extensions:
//! [`RequestFailure`] carries the error's own status, [`OperationName`] adds
//! the `operationName` label.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::time::Instant;

use super::request::{RequestInfo, RequestMetrics};

/// Marks a response as produced by a failed request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFailure {
    pub status: Option<u16>,
}

/// Operation name of an RPC-style request body.
#[derive(Debug, Clone)]
pub struct OperationName(pub String);

pub async fn track_requests(
    State(metrics): State<Arc<RequestMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_owned();
    let matched = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned());

    let started = Instant::now();
    let res = next.run(req).await;
    let elapsed = started.elapsed();

    let status = res.status().as_u16();
    let failure = res.extensions().get::<RequestFailure>().copied();
    let operation = res.extensions().get::<OperationName>().map(|o| o.0.as_str());

    let info = RequestInfo {
        method: &method,
        matched_route: matched.as_deref(),
        // Unmatched requests collapse to the undefined route instead of
        // minting one series per literal URL.
        raw_path: None,
        status_code: status,
        elapsed,
        operation_name: operation,
    };

    if failure.is_some() || status >= 400 {
        metrics.on_error(&info, failure.and_then(|f| f.status));
    }
    metrics.on_response(&info);

    res
}

/// Attach [`track_requests`] to every route of `router`.
pub fn instrument<S>(router: Router<S>, metrics: Arc<RequestMetrics>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(metrics, track_requests))
}
