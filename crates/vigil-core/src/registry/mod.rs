//! Instrument registry.
//!
//! Owns every named instrument of the process. The instrument list sits behind
//! one `RwLock` (written only at registration time); series data lives in the
//! instruments themselves as atomics, so recording never touches the registry
//! lock. `collect()` clones the handle list, then reads each instrument.
//!
//! Collection order within one pass:
//! 1. batch callbacks, in registration order;
//! 2. instruments, in registration order; for gauges every callback runs in
//!    the order it was added.

pub mod instruments;
pub mod snapshot;
pub mod view;

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use crate::error::{Result, VigilError};
use crate::exposition::{self, TARGET_INFO};
use crate::labels::LabelSet;
use crate::resource::Resource;

pub use instruments::{
    Counter, Descriptor, GaugeObserver, Histogram, HistogramPoint, InstrumentKind,
    ObservableGauge,
};
pub use snapshot::{MetricData, Points, Snapshot};
pub use view::{validate_boundaries, View, DEFAULT_BOUNDARIES};

const MAX_NAME_LEN: usize = 255;

#[derive(Clone)]
enum Instrument {
    Counter(Counter),
    Histogram(Histogram),
    Gauge(ObservableGauge),
}

impl Instrument {
    fn exported_name(&self) -> String {
        let d = match self {
            Instrument::Counter(c) => c.descriptor(),
            Instrument::Histogram(h) => h.descriptor(),
            Instrument::Gauge(g) => g.descriptor(),
        };
        exposition::exported_name(&d.name, d.kind)
    }

    fn name(&self) -> &str {
        match self {
            Instrument::Counter(c) => &c.descriptor().name,
            Instrument::Histogram(h) => &h.descriptor().name,
            Instrument::Gauge(g) => &g.descriptor().name,
        }
    }
}

/// Sink handed to batch callbacks; may observe any gauge the callback was
/// registered with.
#[derive(Debug, Default)]
pub struct BatchObserver {
    allowed: Vec<String>,
    points: HashMap<String, Vec<(LabelSet, f64)>>,
}

impl BatchObserver {
    pub fn observe(&mut self, gauge: &ObservableGauge, value: f64) {
        self.observe_labels(gauge, value, LabelSet::empty());
    }

    pub fn observe_with(&mut self, gauge: &ObservableGauge, value: f64, labels: &[(&str, &str)]) {
        self.observe_labels(gauge, value, LabelSet::from(labels));
    }

    pub fn observe_labels(&mut self, gauge: &ObservableGauge, value: f64, labels: LabelSet) {
        let name = &gauge.descriptor().name;
        if !self.allowed.iter().any(|a| a == name) {
            tracing::warn!(instrument = %name, "batch callback observed an unregistered gauge");
            return;
        }
        instruments::upsert(self.points.entry(name.clone()).or_default(), labels, value);
    }
}

type BatchCallback = dyn Fn(&mut BatchObserver) -> Result<()> + Send + Sync;

struct BatchEntry {
    gauges: Vec<String>,
    callback: Arc<BatchCallback>,
}

pub struct Registry {
    resource: Resource,
    views: Vec<View>,
    instruments: RwLock<Vec<Instrument>>,
    batches: RwLock<Vec<BatchEntry>>,
}

impl Registry {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            views: Vec::new(),
            instruments: RwLock::new(Vec::new()),
            batches: RwLock::new(Vec::new()),
        }
    }

    /// Registry with histogram views. Every view is validated up front.
    pub fn with_views(resource: Resource, views: Vec<View>) -> Result<Self> {
        for v in &views {
            v.validate()?;
        }
        let mut reg = Self::new(resource);
        reg.views = views;
        Ok(reg)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn create_counter(
        &self,
        name: &str,
        description: &str,
        unit: Option<&str>,
    ) -> Result<Counter> {
        let counter = Counter::new(descriptor(name, description, unit, InstrumentKind::Counter));
        self.register(Instrument::Counter(counter.clone()))?;
        Ok(counter)
    }

    /// Boundaries resolve as: explicit argument, then a matching view, then
    /// [`DEFAULT_BOUNDARIES`].
    pub fn create_histogram(
        &self,
        name: &str,
        description: &str,
        unit: Option<&str>,
        boundaries: Option<Vec<f64>>,
    ) -> Result<Histogram> {
        let boundaries = match boundaries {
            Some(b) => b,
            None => self
                .views
                .iter()
                .rev()
                .find(|v| v.instrument == name)
                .map(|v| v.boundaries.clone())
                .unwrap_or_else(|| DEFAULT_BOUNDARIES.to_vec()),
        };
        validate_boundaries(name, &boundaries)?;

        let histogram = Histogram::new(
            descriptor(name, description, unit, InstrumentKind::Histogram),
            boundaries,
        );
        self.register(Instrument::Histogram(histogram.clone()))?;
        Ok(histogram)
    }

    pub fn create_observable_gauge(
        &self,
        name: &str,
        description: &str,
        unit: Option<&str>,
    ) -> Result<ObservableGauge> {
        let gauge = ObservableGauge::new(descriptor(
            name,
            description,
            unit,
            InstrumentKind::ObservableGauge,
        ));
        self.register(Instrument::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    /// Register one callback observing several gauges. It runs once per
    /// collection pass, before any per-gauge callback.
    pub fn add_batch_callback<F>(&self, gauges: &[&ObservableGauge], callback: F) -> Result<()>
    where
        F: Fn(&mut BatchObserver) -> Result<()> + Send + Sync + 'static,
    {
        let names: Vec<String> = gauges.iter().map(|g| g.descriptor().name.clone()).collect();
        {
            let list = self.read_instruments()?;
            for n in &names {
                if !list.iter().any(|i| matches!(i, Instrument::Gauge(_)) && i.name() == n) {
                    return Err(VigilError::InvalidInstrument(format!(
                        "{n} is not a gauge of this registry"
                    )));
                }
            }
        }

        let mut g = self
            .batches
            .write()
            .map_err(|_| VigilError::Internal("batch list poisoned".into()))?;
        g.push(BatchEntry {
            gauges: names,
            callback: Arc::new(callback),
        });
        Ok(())
    }

    /// Gather every series as of now. Never fails: callback failures are
    /// reported in [`Snapshot::errors`] and the failing callback's
    /// observations are dropped.
    pub fn collect(&self) -> Snapshot {
        let mut errors = Vec::new();

        let list = match self.read_instruments() {
            Ok(g) => g.clone(),
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };

        let batch_points = self.run_batches(&mut errors);

        let mut metrics = Vec::with_capacity(list.len());
        for inst in &list {
            let (descriptor, points) = match inst {
                Instrument::Counter(c) => (c.descriptor().clone(), Points::Counter(c.points())),
                Instrument::Histogram(h) => {
                    (h.descriptor().clone(), Points::Histogram(h.points()))
                }
                Instrument::Gauge(g) => {
                    let mut points = batch_points
                        .get(&g.descriptor().name)
                        .cloned()
                        .unwrap_or_default();
                    collect_gauge(g, &mut points, &mut errors);
                    points.sort_by(|a, b| a.0.cmp(&b.0));
                    (g.descriptor().clone(), Points::Gauge(points))
                }
            };
            if !points.is_empty() {
                metrics.push(MetricData { descriptor, points });
            }
        }

        Snapshot {
            resource: self.resource.clone(),
            metrics,
            errors,
        }
    }

    fn run_batches(&self, errors: &mut Vec<VigilError>) -> HashMap<String, Vec<(LabelSet, f64)>> {
        let entries: Vec<(Vec<String>, Arc<BatchCallback>)> = match self.batches.read() {
            Ok(g) => g
                .iter()
                .map(|b| (b.gauges.clone(), Arc::clone(&b.callback)))
                .collect(),
            Err(_) => {
                errors.push(VigilError::Internal("batch list poisoned".into()));
                return HashMap::new();
            }
        };

        let mut merged: HashMap<String, Vec<(LabelSet, f64)>> = HashMap::new();
        for (gauges, callback) in entries {
            let mut observer = BatchObserver {
                allowed: gauges.clone(),
                points: HashMap::new(),
            };
            match invoke(|| callback(&mut observer)) {
                Ok(()) => {
                    for (name, points) in observer.points {
                        let slot = merged.entry(name).or_default();
                        for (labels, value) in points {
                            instruments::upsert(slot, labels, value);
                        }
                    }
                }
                Err(message) => errors.push(VigilError::Callback {
                    instrument: gauges.join(","),
                    message,
                }),
            }
        }
        merged
    }

    fn register(&self, inst: Instrument) -> Result<()> {
        validate_name(inst.name())?;
        let mut g = self
            .instruments
            .write()
            .map_err(|_| VigilError::Internal("instrument list poisoned".into()))?;
        if g.iter().any(|existing| existing.name() == inst.name()) {
            return Err(VigilError::DuplicateInstrument(inst.name().to_string()));
        }
        // Distinct raw names may still collide once sanitized and suffixed.
        let exported = inst.exported_name();
        if exported == TARGET_INFO {
            return Err(VigilError::DuplicateInstrument(format!(
                "{} is reserved for resource attributes",
                inst.name()
            )));
        }
        if let Some(existing) = g.iter().find(|e| e.exported_name() == exported) {
            return Err(VigilError::DuplicateInstrument(format!(
                "{} exports as {exported}, already used by {}",
                inst.name(),
                existing.name()
            )));
        }
        tracing::debug!(instrument = %inst.name(), "instrument registered");
        g.push(inst);
        Ok(())
    }

    fn read_instruments(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Instrument>>> {
        self.instruments
            .read()
            .map_err(|_| VigilError::Internal("instrument list poisoned".into()))
    }
}

fn descriptor(name: &str, description: &str, unit: Option<&str>, kind: InstrumentKind) -> Descriptor {
    Descriptor {
        name: name.to_string(),
        description: description.to_string(),
        unit: unit.filter(|u| !u.is_empty()).map(str::to_string),
        kind,
    }
}

/// `[A-Za-z][A-Za-z0-9_.\-/]*`, at most 255 chars.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'));
    if !starts_alpha || !rest_ok || name.len() > MAX_NAME_LEN {
        return Err(VigilError::InvalidInstrument(format!("invalid name: {name:?}")));
    }
    Ok(())
}

fn collect_gauge(
    gauge: &ObservableGauge,
    points: &mut Vec<(LabelSet, f64)>,
    errors: &mut Vec<VigilError>,
) {
    let name = &gauge.descriptor().name;
    let callbacks = match gauge.callbacks() {
        Ok(c) => c,
        Err(e) => {
            errors.push(e);
            return;
        }
    };

    for callback in callbacks {
        let mut observer = GaugeObserver::default();
        match invoke(|| callback(&mut observer)) {
            Ok(()) => {
                for (labels, value) in observer.into_points() {
                    instruments::upsert(points, labels, value);
                }
            }
            Err(message) => errors.push(VigilError::Callback {
                instrument: name.clone(),
                message,
            }),
        }
    }
}

/// Run a callback, turning both `Err` and panics into a message.
fn invoke(f: impl FnOnce() -> Result<()>) -> std::result::Result<(), String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
