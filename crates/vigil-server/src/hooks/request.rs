//! Request hook adapter.
//!
//! Called by the routing layer once per completed request (`on_response`) and
//! once per failed request (`on_error`). Writes only to instruments; never
//! returns an error to the caller. Malformed metadata skips the write and is
//! logged.

use std::time::Duration;

use vigil_core::error::{Result, VigilError};
use vigil_core::registry::{Counter, Histogram};
use vigil_core::{LabelSet, Registry};

use super::ignore::IgnorePolicy;

pub const REQUEST_COUNT: &str = "http_request_count";
pub const ERROR_COUNT: &str = "http_error_count";
pub const REQUEST_DURATION: &str = "http_request_duration_ms";

/// Route label used when neither a matched template nor a raw path exists.
pub const UNDEFINED_ROUTE: &str = "UNDEFINED";

/// Metadata of one finished request, as seen by the routing layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestInfo<'a> {
    pub method: &'a str,
    /// Route template (e.g. `/widgets/:id`). Preferred over `raw_path`.
    pub matched_route: Option<&'a str>,
    pub raw_path: Option<&'a str>,
    pub status_code: u16,
    pub elapsed: Duration,
    /// RPC-style operation name, added as an extra label when present.
    pub operation_name: Option<&'a str>,
}

impl<'a> RequestInfo<'a> {
    /// Matched template first so path parameters don't explode cardinality.
    pub fn effective_route(&self) -> &'a str {
        self.matched_route
            .filter(|r| !r.is_empty())
            .or(self.raw_path.filter(|p| !p.is_empty()))
            .unwrap_or(UNDEFINED_ROUTE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    ClientError,
    ServerError,
}

impl ErrorType {
    /// 4xx is a client error; everything else reaching the error hook is
    /// attributed to the server.
    pub fn from_status(status: u16) -> Self {
        if (400..500).contains(&status) {
            ErrorType::ClientError
        } else {
            ErrorType::ServerError
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::ClientError => "client_error",
            ErrorType::ServerError => "server_error",
        }
    }
}

pub struct RequestMetrics {
    requests: Counter,
    errors: Counter,
    duration: Histogram,
    ignore: IgnorePolicy,
}

impl RequestMetrics {
    /// Create the request counter, error counter and duration histogram.
    pub fn register(registry: &Registry, ignore: IgnorePolicy) -> Result<Self> {
        let requests = registry.create_counter(REQUEST_COUNT, "Count of requests", None)?;
        let errors = registry.create_counter(ERROR_COUNT, "Count of errors", None)?;
        let duration = registry.create_histogram(
            REQUEST_DURATION,
            "Response duration in ms.",
            Some("ms"),
            None,
        )?;
        Ok(Self {
            requests,
            errors,
            duration,
            ignore,
        })
    }

    pub fn ignore_policy(&self) -> &IgnorePolicy {
        &self.ignore
    }

    pub fn on_response(&self, req: &RequestInfo<'_>) {
        if let Err(e) = self.try_on_response(req) {
            tracing::warn!(error = %e, method = %req.method, route = %req.effective_route(), "request metric skipped");
        }
    }

    /// `error_status` is the error's own status; when absent the response
    /// status is used.
    pub fn on_error(&self, req: &RequestInfo<'_>, error_status: Option<u16>) {
        if let Err(e) = self.try_on_error(req, error_status) {
            tracing::warn!(error = %e, method = %req.method, route = %req.effective_route(), "error metric skipped");
        }
    }

    fn try_on_response(&self, req: &RequestInfo<'_>) -> Result<()> {
        let route = req.effective_route();
        if self.ignore.is_ignored(route) {
            return Ok(());
        }
        let labels = base_labels(req, route, req.status_code)?;

        self.requests.add_labels(1, labels.clone());
        self.duration
            .record_labels(req.elapsed.as_secs_f64() * 1_000.0, labels);
        Ok(())
    }

    fn try_on_error(&self, req: &RequestInfo<'_>, error_status: Option<u16>) -> Result<()> {
        let route = req.effective_route();
        if self.ignore.is_ignored(route) {
            return Ok(());
        }
        let status = error_status.filter(|s| *s != 0).unwrap_or(req.status_code);
        let labels = base_labels(req, route, status)?;

        let mut pairs: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        pairs.push((
            "error_type".to_string(),
            ErrorType::from_status(status).as_str().to_string(),
        ));

        self.errors.add_labels(1, LabelSet::from_pairs(pairs));
        Ok(())
    }
}

fn base_labels(req: &RequestInfo<'_>, route: &str, status: u16) -> Result<LabelSet> {
    if req.method.trim().is_empty() {
        return Err(VigilError::Recording("missing request method".into()));
    }
    if !(100..=599).contains(&status) {
        return Err(VigilError::Recording(format!("invalid status code: {status}")));
    }

    let status = status.to_string();
    let mut pairs = vec![
        ("method", req.method),
        ("route", route),
        ("statusCode", status.as_str()),
    ];
    if let Some(op) = req.operation_name.filter(|o| !o.is_empty()) {
        pairs.push(("operationName", op));
    }
    Ok(LabelSet::from_pairs(pairs))
}
