//! Result of one collection pass.

use crate::error::VigilError;
use crate::labels::LabelSet;
use crate::resource::Resource;

use super::instruments::{Descriptor, HistogramPoint};

#[derive(Debug, Clone, PartialEq)]
pub enum Points {
    Counter(Vec<(LabelSet, u64)>),
    Histogram(Vec<(LabelSet, HistogramPoint)>),
    Gauge(Vec<(LabelSet, f64)>),
}

impl Points {
    pub fn len(&self) -> usize {
        match self {
            Points::Counter(p) => p.len(),
            Points::Histogram(p) => p.len(),
            Points::Gauge(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricData {
    pub descriptor: Descriptor,
    pub points: Points,
}

/// Every instrument with at least one series, in registration order, plus the
/// errors raised by gauge callbacks during the pass.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub resource: Resource,
    pub metrics: Vec<MetricData>,
    pub errors: Vec<VigilError>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn metric(&self, name: &str) -> Option<&MetricData> {
        self.metrics.iter().find(|m| m.descriptor.name == name)
    }

    pub fn counter_value(&self, name: &str, labels: &LabelSet) -> Option<u64> {
        match &self.metric(name)?.points {
            Points::Counter(points) => points.iter().find(|(l, _)| l == labels).map(|(_, v)| *v),
            _ => None,
        }
    }

    pub fn gauge_value(&self, name: &str, labels: &LabelSet) -> Option<f64> {
        match &self.metric(name)?.points {
            Points::Gauge(points) => points.iter().find(|(l, _)| l == labels).map(|(_, v)| *v),
            _ => None,
        }
    }

    pub fn histogram_point(&self, name: &str, labels: &LabelSet) -> Option<&HistogramPoint> {
        match &self.metric(name)?.points {
            Points::Histogram(points) => points.iter().find(|(l, _)| l == labels).map(|(_, p)| p),
            _ => None,
        }
    }
}
