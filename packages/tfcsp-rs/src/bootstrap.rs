//! Bootstrap confidence intervals of the group mean score

use crate::aggregate::ScoreStack;
use crate::error::{DecodingError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Descriptive statistics per frequency bin across subjects and sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    /// Number of subject x session slots, including NaN slots
    pub n: usize,
    pub mean: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    /// Standard deviation of the bootstrap means
    pub se: Vec<f64>,
    pub ci_lower: Vec<f64>,
    pub ci_upper: Vec<f64>,
}

impl AggregatedStats {
    pub fn n_bins(&self) -> usize {
        self.mean.len()
    }
}

/// Quantile with linear interpolation between closest ranks; `sorted` must
/// be ascending and non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Bootstrap the mean of every bin of a 1-D score stack.
///
/// Each bin resamples its finite values with replacement `n_boot` times,
/// drawing from one generator seeded by `seed` (OS entropy when `None`).
/// A bin without finite values yields NaN everywhere.
pub fn compute_conf_inter(
    stack: &ScoreStack,
    n_boot: usize,
    seed: Option<u64>,
) -> Result<AggregatedStats> {
    if stack.shape.len() != 1 {
        return Err(DecodingError::InvalidParameter(format!(
            "confidence intervals need a 1-D score stack, got shape {:?}",
            stack.shape
        )));
    }
    if n_boot == 0 {
        return Err(DecodingError::InvalidParameter(
            "n_boot must be at least 1".to_string(),
        ));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let n_bins = stack.shape[0];
    let mut stats = AggregatedStats {
        n: stack.n_slots(),
        mean: Vec::with_capacity(n_bins),
        min: Vec::with_capacity(n_bins),
        max: Vec::with_capacity(n_bins),
        se: Vec::with_capacity(n_bins),
        ci_lower: Vec::with_capacity(n_bins),
        ci_upper: Vec::with_capacity(n_bins),
    };

    for bin in 0..n_bins {
        let values: Vec<f64> = stack
            .cell(bin)
            .into_iter()
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            for column in [
                &mut stats.mean,
                &mut stats.min,
                &mut stats.max,
                &mut stats.se,
                &mut stats.ci_lower,
                &mut stats.ci_upper,
            ] {
                column.push(f64::NAN);
            }
            continue;
        }

        let n = values.len();
        stats.mean.push(values.iter().sum::<f64>() / n as f64);
        stats.min.push(values.iter().copied().fold(f64::INFINITY, f64::min));
        stats.max.push(values.iter().copied().fold(f64::NEG_INFINITY, f64::max));

        let mut boot_means: Vec<f64> = (0..n_boot)
            .map(|_| (0..n).map(|_| values[rng.random_range(0..n)]).sum::<f64>() / n as f64)
            .collect();
        stats.se.push(sample_std(&boot_means));
        boot_means.sort_by(|a, b| a.total_cmp(b));
        stats.ci_lower.push(quantile(&boot_means, 0.025));
        stats.ci_upper.push(quantile(&boot_means, 0.975));
    }

    Ok(stats)
}
