//! Frequency and time bins of the decoding map.

use crate::error::{DecodingError, Result};
use crate::types::EpochSet;
use serde::{Deserialize, Serialize};

/// Frequency and time bin edges, with derived windows and bin centers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTimeGrid {
    freqs: Vec<f64>,
    times: Vec<f64>,
}

impl FrequencyTimeGrid {
    /// Create a grid from ascending frequency edges (Hz) and time edges (s)
    pub fn new(freqs: Vec<f64>, times: Vec<f64>) -> Result<Self> {
        check_edges("frequency", &freqs)?;
        check_edges("time", &times)?;
        if freqs[0] < 0.0 {
            return Err(DecodingError::InvalidGrid(format!(
                "frequency edges must be non-negative, got {}",
                freqs[0]
            )));
        }
        Ok(Self { freqs, times })
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_freq_windows(&self) -> usize {
        self.freqs.len() - 1
    }

    pub fn n_time_windows(&self) -> usize {
        self.times.len() - 1
    }

    /// Highest analysed frequency, which bounds the decimation factor
    pub fn max_freq(&self) -> f64 {
        self.freqs[self.freqs.len() - 1]
    }

    pub fn freq_ranges(&self) -> Vec<(f64, f64)> {
        self.freqs.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn time_ranges(&self) -> Vec<(f64, f64)> {
        self.times.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn centered_freqs(&self) -> Vec<f64> {
        self.freqs.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    }

    pub fn centered_times(&self) -> Vec<f64> {
        self.times.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    }

    /// Fail when the time bins reach outside the epochs' time extent
    pub fn check_times(&self, epochs: &EpochSet) -> Result<()> {
        let tmin = self.times[0];
        let tmax = self.times[self.times.len() - 1];
        let slack = 0.5 / epochs.sfreq;
        let (epoch_tmin, epoch_tmax) = (epochs.tmin, epochs.tmax());
        if tmin < epoch_tmin - slack || tmax > epoch_tmax + slack {
            return Err(DecodingError::GridBounds {
                tmin,
                tmax,
                epoch_tmin,
                epoch_tmax,
            });
        }
        Ok(())
    }
}

fn check_edges(label: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(DecodingError::InvalidGrid(format!(
            "at least 2 {} edges are needed, got {}",
            label,
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(DecodingError::InvalidGrid(format!(
            "{} edges must be finite",
            label
        )));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(DecodingError::InvalidGrid(format!(
            "{} edges must be strictly ascending: {:?}",
            label, edges
        )));
    }
    Ok(())
}
