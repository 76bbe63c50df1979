//! Shared state of the ops server.

use std::sync::Arc;

use vigil_core::error::Result;

use crate::config::VigilConfig;
use crate::telemetry::Telemetry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: VigilConfig,
    telemetry: Arc<Telemetry>,
}

impl AppState {
    /// Build telemetry from `cfg`. Configuration errors are fatal to startup.
    pub fn new(cfg: VigilConfig) -> Result<Self> {
        let telemetry = Arc::new(Telemetry::new(&cfg)?);
        Ok(Self::with_telemetry(cfg, telemetry))
    }

    pub fn with_telemetry(cfg: VigilConfig, telemetry: Arc<Telemetry>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cfg, telemetry }),
        }
    }

    pub fn cfg(&self) -> &VigilConfig {
        &self.inner.cfg
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.inner.telemetry
    }
}
