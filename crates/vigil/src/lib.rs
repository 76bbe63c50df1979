//! Top-level facade crate for Vigil.
//!
//! Re-exports the core registry and the server integration so users can depend on a single crate.

pub mod core {
    pub use vigil_core::*;
}

pub mod server {
    pub use vigil_server::*;
}

pub use vigil_core::{LabelSet, Registry, Resource, Snapshot, VigilError};
pub use vigil_server::Telemetry;
