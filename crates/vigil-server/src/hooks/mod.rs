//! Request hooks (ignore policy, adapter, axum middleware).

pub mod ignore;
pub mod middleware;
pub mod request;

pub use ignore::IgnorePolicy;
pub use middleware::{instrument, track_requests, OperationName, RequestFailure};
pub use request::{ErrorType, RequestInfo, RequestMetrics};
