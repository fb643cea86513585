//! Progress observations and their normalization.
//!
//! Each source reports progress differently: the e-reader stores a page
//! percentage, the audiobook player stores elapsed seconds against the media
//! duration. Everything downstream compares a single fraction in `[0, 1]`,
//! and this module is the only place that produces it.

use serde::{Deserialize, Serialize};

/// One progress observation from a single source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub fraction: Option<f64>,
    pub raw_label: Option<String>,
    pub elapsed_seconds: Option<f64>,
    pub total_seconds: Option<f64>,
    /// Unix seconds.
    pub observed_at: Option<f64>,
    pub source_device: Option<String>,
}

impl Progress {
    pub fn from_fraction(fraction: f64) -> Self {
        Self {
            fraction: Some(fraction),
            ..Self::default()
        }
    }

    pub fn from_elapsed(elapsed_seconds: f64, total_seconds: f64) -> Self {
        Self {
            elapsed_seconds: Some(elapsed_seconds),
            total_seconds: Some(total_seconds),
            ..Self::default()
        }
    }

    pub fn observed_at(mut self, unix_secs: f64) -> Self {
        self.observed_at = Some(unix_secs);
        self
    }

    /// Normalized completion for this observation; see [`normalize`].
    pub fn fraction(&self) -> Option<f64> {
        normalize(Some(self))
    }
}

/// Reduce a progress observation to a completion fraction in `[0, 1]`.
///
/// A stored fraction always takes precedence over one derived from elapsed
/// and total seconds. Returns `None` ("unknown") when neither is usable.
pub fn normalize(progress: Option<&Progress>) -> Option<f64> {
    let progress = progress?;
    if let Some(fraction) = progress.fraction.filter(|value| !value.is_nan()) {
        return Some(fraction.clamp(0.0, 1.0));
    }

    let total = progress
        .total_seconds
        .filter(|total| total.is_finite() && *total > 0.0)?;
    let elapsed = progress.elapsed_seconds.filter(|value| !value.is_nan())?;
    Some((elapsed / total).clamp(0.0, 1.0))
}

/// True when the fraction is strictly between "not started" and "finished".
pub fn is_in_progress(fraction: Option<f64>) -> bool {
    matches!(fraction, Some(f) if f > 0.0 && f < 1.0)
}
