//! Live scheduler resources of the host tokio runtime.
//!
//! One gauge, `runtime_active_resources_by_type_count{type=...}`, evaluated at
//! collection time from `RuntimeMetrics`. Until a runtime handle is attached
//! the gauge reports nothing.

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use vigil_core::error::{Result, VigilError};
use vigil_core::registry::GaugeObserver;
use vigil_core::Registry;

pub const ACTIVE_RESOURCES: &str = "runtime_active_resources_by_type_count";

pub struct ActiveResources {
    handle: Arc<Mutex<Option<Handle>>>,
}

impl ActiveResources {
    /// Create the gauge and its callback.
    pub fn register(registry: &Registry) -> Result<Self> {
        let gauge = registry.create_observable_gauge(
            ACTIVE_RESOURCES,
            "Number of active resources by type",
            None,
        )?;

        let handle: Arc<Mutex<Option<Handle>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&handle);
        gauge.add_callback(move |o| {
            let h = slot
                .lock()
                .map_err(|_| VigilError::Internal("runtime handle slot poisoned".into()))?
                .clone();
            if let Some(h) = h {
                observe_runtime(&h, o);
            }
            Ok(())
        })?;

        Ok(Self { handle })
    }

    /// Report on the runtime behind `handle` from now on.
    pub fn attach(&self, handle: Handle) {
        if let Ok(mut g) = self.handle.lock() {
            *g = Some(handle);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut g) = self.handle.lock() {
            *g = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.handle.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

fn observe_runtime(handle: &Handle, o: &mut GaugeObserver) {
    let m = handle.metrics();
    o.observe_with(m.num_workers() as f64, &[("type", "workers")]);
    o.observe_with(m.num_alive_tasks() as f64, &[("type", "alive_tasks")]);
    o.observe_with(m.global_queue_depth() as f64, &[("type", "global_queue")]);
}
