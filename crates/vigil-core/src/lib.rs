//! vigil core: in-process metric instruments, GC pause classification, and
//! Prometheus text exposition.
//!
//! This crate owns the aggregation state and its serialization. It carries no
//! HTTP or async runtime dependency so hosts can drive it from any integration
//! layer (see `vigil-server` for the axum/tokio one).
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Recording and collection never bring the host process down: failures
//! surface as `VigilError` values or entries in `Snapshot::errors`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod exposition;
pub mod gc;
pub mod labels;
pub mod registry;
pub mod resource;

/// Shared result type.
pub use error::{ErrorKind, Result, VigilError};
pub use labels::LabelSet;
pub use registry::{Registry, Snapshot};
pub use resource::Resource;
