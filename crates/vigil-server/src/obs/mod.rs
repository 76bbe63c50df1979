//! Runtime samplers backed by the tokio scheduler.

pub mod event_loop;
pub mod resources;

pub use event_loop::{register_delay_gauges, DelayPercentiles, EventLoopDelaySampler};
pub use resources::ActiveResources;
