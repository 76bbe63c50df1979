//! Instrument handles: counters, histograms and observable gauges.
//!
//! Series are keyed by [`LabelSet`] in a `DashMap` and created lazily on first
//! observation; they are never removed. Counters and histogram buckets are
//! plain atomics so writers never block each other or the collector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::error::{Result, VigilError};
use crate::labels::LabelSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    Histogram,
    ObservableGauge,
}

impl InstrumentKind {
    /// Exposition type name.
    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::ObservableGauge => "gauge",
        }
    }
}

/// Static metadata of an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub description: String,
    pub unit: Option<String>,
    pub kind: InstrumentKind,
}

// --------------------
// Counter
// --------------------

/// Monotonic integer counter. Deltas are whole units; fractional quantities
/// belong in a [`Histogram`] (its `_sum` is a float).
#[derive(Clone)]
pub struct Counter {
    descriptor: Arc<Descriptor>,
    series: Arc<DashMap<LabelSet, AtomicU64>>,
}

impl Counter {
    pub(crate) fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            series: Arc::new(DashMap::new()),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(1, labels);
    }

    /// Increment by an arbitrary non-negative delta.
    pub fn add(&self, delta: u64, labels: &[(&str, &str)]) {
        self.add_labels(delta, LabelSet::from(labels));
    }

    pub fn add_labels(&self, delta: u64, labels: LabelSet) {
        let counter = self.series.entry(labels).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn points(&self) -> Vec<(LabelSet, u64)> {
        let mut out: Vec<(LabelSet, u64)> = self
            .series
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

// --------------------
// Histogram
// --------------------

/// Per-series accumulator. `buckets[i]` counts values in
/// `(boundaries[i-1], boundaries[i]]`; the last slot is the overflow bucket.
struct HistogramSeries {
    buckets: Box<[AtomicU64]>,
    sum_bits: AtomicU64,
}

impl HistogramSeries {
    fn new(slots: usize) -> Self {
        Self {
            buckets: (0..slots).map(|_| AtomicU64::new(0)).collect(),
            sum_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn observe(&self, slot: usize, value: f64) {
        if let Some(bucket) = self.buckets.get(slot) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }
}

/// Point-in-time view of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPoint {
    pub boundaries: Arc<[f64]>,
    /// Non-cumulative counts, `boundaries.len() + 1` entries.
    pub bucket_counts: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

impl HistogramPoint {
    /// Cumulative counts aligned with `boundaries`, followed by the `+Inf`
    /// bucket (always equal to `count`).
    pub fn cumulative(&self) -> Vec<u64> {
        let mut acc = 0u64;
        self.bucket_counts
            .iter()
            .map(|c| {
                acc += c;
                acc
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct Histogram {
    descriptor: Arc<Descriptor>,
    boundaries: Arc<[f64]>,
    series: Arc<DashMap<LabelSet, HistogramSeries>>,
}

impl Histogram {
    pub(crate) fn new(descriptor: Descriptor, boundaries: Vec<f64>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            boundaries: boundaries.into(),
            series: Arc::new(DashMap::new()),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Record one observation. Negative and non-finite values are dropped.
    pub fn record(&self, value: f64, labels: &[(&str, &str)]) {
        self.record_labels(value, LabelSet::from(labels));
    }

    pub fn record_labels(&self, value: f64, labels: LabelSet) {
        if !value.is_finite() || value < 0.0 {
            tracing::warn!(instrument = %self.descriptor.name, value, "histogram value dropped");
            return;
        }
        // first boundary >= value, i.e. the `le` bucket
        let slot = self.boundaries.partition_point(|b| *b < value);
        let slots = self.boundaries.len() + 1;
        let series = self
            .series
            .entry(labels)
            .or_insert_with(|| HistogramSeries::new(slots));
        series.observe(slot, value);
    }

    pub(crate) fn points(&self) -> Vec<(LabelSet, HistogramPoint)> {
        let mut out: Vec<(LabelSet, HistogramPoint)> = self
            .series
            .iter()
            .map(|r| {
                let bucket_counts: Vec<u64> = r
                    .value()
                    .buckets
                    .iter()
                    .map(|b| b.load(Ordering::Relaxed))
                    .collect();
                let count = bucket_counts.iter().sum();
                let point = HistogramPoint {
                    boundaries: Arc::clone(&self.boundaries),
                    bucket_counts,
                    sum: f64::from_bits(r.value().sum_bits.load(Ordering::Relaxed)),
                    count,
                };
                (r.key().clone(), point)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

// --------------------
// Observable gauge
// --------------------

/// Sink handed to gauge callbacks during a collection pass.
#[derive(Debug, Default)]
pub struct GaugeObserver {
    points: Vec<(LabelSet, f64)>,
}

impl GaugeObserver {
    /// Report a value for the empty label set.
    pub fn observe(&mut self, value: f64) {
        self.observe_labels(value, LabelSet::empty());
    }

    pub fn observe_with(&mut self, value: f64, labels: &[(&str, &str)]) {
        self.observe_labels(value, LabelSet::from(labels));
    }

    pub fn observe_labels(&mut self, value: f64, labels: LabelSet) {
        upsert(&mut self.points, labels, value);
    }

    pub(crate) fn into_points(self) -> Vec<(LabelSet, f64)> {
        self.points
    }
}

pub type GaugeCallback = dyn Fn(&mut GaugeObserver) -> Result<()> + Send + Sync;

#[derive(Clone)]
pub struct ObservableGauge {
    descriptor: Arc<Descriptor>,
    callbacks: Arc<Mutex<Vec<Arc<GaugeCallback>>>>,
}

impl ObservableGauge {
    pub(crate) fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Register a callback. Callbacks run synchronously at collection time in
    /// registration order and must not block.
    pub fn add_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&mut GaugeObserver) -> Result<()> + Send + Sync + 'static,
    {
        let mut g = self
            .callbacks
            .lock()
            .map_err(|_| VigilError::Internal("gauge callback list poisoned".into()))?;
        g.push(Arc::new(callback));
        Ok(())
    }

    /// Copy of the callback list so no lock is held while callbacks run.
    pub(crate) fn callbacks(&self) -> Result<Vec<Arc<GaugeCallback>>> {
        self.callbacks
            .lock()
            .map(|g| g.clone())
            .map_err(|_| VigilError::Internal("gauge callback list poisoned".into()))
    }
}

pub(crate) fn upsert(points: &mut Vec<(LabelSet, f64)>, labels: LabelSet, value: f64) {
    match points.iter_mut().find(|(l, _)| *l == labels) {
        Some(slot) => slot.1 = value,
        None => points.push((labels, value)),
    }
}
