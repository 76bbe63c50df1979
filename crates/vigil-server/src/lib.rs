//! Vigil server integration.
//!
//! Wires the core registry into a tokio/axum host: strict YAML config, the
//! request hook adapter and its middleware, runtime samplers, the
//! [`telemetry::Telemetry`] bundle, and the ops router serving `/metrics`.
//! Consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod hooks;
pub mod obs;
pub mod ops;
pub mod router;
pub mod telemetry;

pub use telemetry::Telemetry;
