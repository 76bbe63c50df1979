//! Telemetry bundle.
//!
//! Owns the registry plus every instrument and sampler built from the config.
//! The host calls [`Telemetry::start`] once it is ready to serve and
//! [`Telemetry::shutdown`] on its way out; [`Telemetry::scrape`] backs
//! `/metrics`.

use std::sync::Arc;
use std::time::Duration;

use vigil_core::error::{Result, VigilError};
use vigil_core::exposition;
use vigil_core::gc::{GcCodeTable, GcPauseObserver, GcPauseSource, DEFAULT_CONSTANTS};
use vigil_core::registry::{View, DEFAULT_BOUNDARIES};
use vigil_core::{Registry, Resource};

use crate::config::VigilConfig;
use crate::hooks::request::REQUEST_DURATION;
use crate::hooks::{IgnorePolicy, RequestMetrics};
use crate::obs::{register_delay_gauges, ActiveResources, EventLoopDelaySampler};

pub const GC_DURATION: &str = "runtime_gc_duration_ms";

pub struct Telemetry {
    registry: Arc<Registry>,
    requests: Option<Arc<RequestMetrics>>,
    event_loop: Option<Arc<EventLoopDelaySampler>>,
    resources: Option<ActiveResources>,
    gc: Option<GcPauseObserver>,
    gc_source: Option<Arc<dyn GcPauseSource>>,
}

impl Telemetry {
    /// Build the registry and instruments. Nothing runs until `start`.
    pub fn new(cfg: &VigilConfig) -> Result<Self> {
        let resource = Resource::new(
            cfg.service.name.clone(),
            cfg.service.version.clone(),
            cfg.service.environment.clone(),
        )?;

        // User views come last so they override the default one.
        let mut views = vec![View::new(REQUEST_DURATION, DEFAULT_BOUNDARIES.to_vec())];
        views.extend(cfg.metrics.views.iter().cloned());
        let registry = Arc::new(Registry::with_views(resource, views)?);

        let m = &cfg.metrics;
        let mut t = Self {
            registry,
            requests: None,
            event_loop: None,
            resources: None,
            gc: None,
            gc_source: None,
        };
        if m.suppress_default_metrics {
            tracing::info!("default metrics suppressed");
            return Ok(t);
        }

        let ignore = IgnorePolicy::from_config(m)?;
        t.requests = Some(Arc::new(RequestMetrics::register(&t.registry, ignore)?));

        if m.suppress_advanced_metrics {
            tracing::info!("advanced metrics suppressed");
            return Ok(t);
        }

        let sampler = Arc::new(EventLoopDelaySampler::new(Duration::from_millis(
            m.event_loop_resolution_ms,
        )));
        register_delay_gauges(&t.registry, Arc::clone(&sampler))?;
        t.event_loop = Some(sampler);

        t.resources = Some(ActiveResources::register(&t.registry)?);

        let gc_hist = t
            .registry
            .create_histogram(GC_DURATION, "Garbage collection duration", Some("ms"), None)?;
        t.gc = Some(GcPauseObserver::new(
            gc_hist,
            GcCodeTable::from_constants(DEFAULT_CONSTANTS.iter().copied()),
        ));

        Ok(t)
    }

    /// Feed GC pauses from `source` once started.
    pub fn with_gc_source(mut self, source: Arc<dyn GcPauseSource>) -> Self {
        self.gc_source = Some(source);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// `None` when default metrics are suppressed.
    pub fn requests(&self) -> Option<&Arc<RequestMetrics>> {
        self.requests.as_ref()
    }

    pub fn event_loop(&self) -> Option<&Arc<EventLoopDelaySampler>> {
        self.event_loop.as_ref()
    }

    pub fn gc(&self) -> Option<&GcPauseObserver> {
        self.gc.as_ref()
    }

    pub fn active_resources(&self) -> Option<&ActiveResources> {
        self.resources.as_ref()
    }

    /// Enable samplers on the current tokio runtime and connect the GC source.
    pub fn start(&self) -> Result<()> {
        if let Some(s) = &self.event_loop {
            s.enable()?;
        }
        if let Some(r) = &self.resources {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|e| VigilError::Lifecycle(format!("no tokio runtime: {e}")))?;
            r.attach(handle);
        }
        if let (Some(gc), Some(source)) = (&self.gc, &self.gc_source) {
            gc.enable(Arc::clone(source))?;
        }
        tracing::info!(service = %self.registry.resource().service_name(), "telemetry started");
        Ok(())
    }

    /// Stop samplers and disconnect the GC source. Safe to call repeatedly or
    /// without a prior `start`.
    pub fn shutdown(&self) {
        if let Some(s) = &self.event_loop {
            s.disable();
        }
        if let Some(r) = &self.resources {
            r.detach();
        }
        if let Some(gc) = &self.gc {
            gc.disable();
        }
        tracing::debug!("telemetry stopped");
    }

    /// Collect and serialize. Collection errors are logged and the partial
    /// result is returned.
    pub fn scrape(&self) -> String {
        let snapshot = self.registry.collect();
        if !snapshot.errors.is_empty() {
            let errors: Vec<String> = snapshot.errors.iter().map(|e| e.to_string()).collect();
            tracing::error!(count = errors.len(), errors = ?errors, "metric collection errors");
        }
        exposition::serialize_or_placeholder(&snapshot)
    }
}
