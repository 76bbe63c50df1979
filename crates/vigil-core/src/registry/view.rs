//! Histogram views (bucket boundary overrides).

use serde::Deserialize;

use crate::error::{Result, VigilError};

/// Default request-duration boundaries, in milliseconds.
pub const DEFAULT_BOUNDARIES: [f64; 11] = [
    25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_000.0, 5_000.0, 10_000.0, 25_000.0, 50_000.0,
];

/// Binds explicit bucket boundaries to an instrument name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct View {
    pub instrument: String,
    pub boundaries: Vec<f64>,
}

impl View {
    pub fn new(instrument: impl Into<String>, boundaries: Vec<f64>) -> Self {
        Self {
            instrument: instrument.into(),
            boundaries,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_boundaries(&self.instrument, &self.boundaries)
    }
}

/// Boundaries must be non-empty, finite and strictly increasing.
pub fn validate_boundaries(instrument: &str, boundaries: &[f64]) -> Result<()> {
    if boundaries.is_empty() {
        return Err(VigilError::InvalidBoundaries(format!(
            "{instrument}: at least one boundary required"
        )));
    }
    if boundaries.iter().any(|b| !b.is_finite()) {
        return Err(VigilError::InvalidBoundaries(format!(
            "{instrument}: boundaries must be finite"
        )));
    }
    if boundaries.windows(2).any(|w| w[0] >= w[1]) {
        return Err(VigilError::InvalidBoundaries(format!(
            "{instrument}: boundaries must be strictly increasing"
        )));
    }
    Ok(())
}
