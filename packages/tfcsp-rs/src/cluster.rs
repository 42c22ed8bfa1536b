//! One-sample t-tests and cluster-based permutation testing over the
//! frequency x time lattice
//!
//! Samples are one row per subject (flattened freq x time grid, row-major)
//! with chance already subtracted. Under the null hypothesis each row is
//! symmetric around zero, so flipping the sign of whole rows generates the
//! null distribution of the largest cluster mass.

use crate::error::{DecodingError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::VecDeque;

/// Uncorrected per-cell t-test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub t_values: Vec<f64>,
    /// Two-sided p-values
    pub p_values: Vec<f64>,
}

/// Connected supra-threshold region of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub mask: Vec<bool>,
    /// Sum of the t-values inside the mask
    pub mass: f64,
    pub p_value: f64,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTestResult {
    /// (n_freq_windows, n_time_windows)
    pub shape: (usize, usize),
    pub threshold: f64,
    pub t_obs: Vec<f64>,
    pub clusters: Vec<Cluster>,
    /// Largest absolute cluster mass of every permutation, observed first
    pub h0: Vec<f64>,
}

impl ClusterTestResult {
    pub fn cluster_p_values(&self) -> Vec<f64> {
        self.clusters.iter().map(|c| c.p_value).collect()
    }

    /// 1.0 outside every cluster, the cluster's p-value inside its mask
    pub fn corrected_p_grid(&self) -> Vec<f64> {
        let mut grid = vec![1.0; self.t_obs.len()];
        for cluster in &self.clusters {
            for (cell, _) in cluster.mask.iter().enumerate().filter(|(_, &m)| m) {
                grid[cell] = cluster.p_value;
            }
        }
        grid
    }

    pub fn min_p_value(&self) -> Option<f64> {
        self.clusters.iter().map(|c| c.p_value).min_by(|a, b| a.total_cmp(b))
    }

    /// True when at least one cluster reaches `alpha`
    pub fn significant(&self, alpha: f64) -> bool {
        self.min_p_value().is_some_and(|p| p <= alpha)
    }
}

fn check_samples(samples: &[Vec<f64>]) -> Result<usize> {
    if samples.len() < 2 {
        return Err(DecodingError::InsufficientSubjects(samples.len()));
    }
    let n_cells = samples[0].len();
    if samples.iter().any(|row| row.len() != n_cells) {
        return Err(DecodingError::InvalidParameter(
            "sample rows differ in length".to_string(),
        ));
    }
    Ok(n_cells)
}

/// Per-cell sum of squares, unchanged by sign flips
fn sum_of_squares(samples: &[Vec<f64>], n_cells: usize) -> Vec<f64> {
    let mut ss = vec![0.0; n_cells];
    for row in samples {
        for (acc, v) in ss.iter_mut().zip(row) {
            *acc += v * v;
        }
    }
    ss
}

/// t-values of the rows multiplied by `signs`
fn signed_t(samples: &[Vec<f64>], sum_sq: &[f64], signs: &[f64]) -> Vec<f64> {
    let n = samples.len() as f64;
    let mut sums = vec![0.0; sum_sq.len()];
    for (row, &s) in samples.iter().zip(signs) {
        for (acc, v) in sums.iter_mut().zip(row) {
            *acc += s * v;
        }
    }
    sums.iter()
        .zip(sum_sq)
        .map(|(&sum, &ss)| {
            let mean = sum / n;
            let var = ((ss - n * mean * mean) / (n - 1.0)).max(0.0);
            mean / (var / n).sqrt()
        })
        .collect()
}

/// One-sample t-test against zero for every cell
pub fn ttest_1samp(samples: &[Vec<f64>]) -> Result<TTestResult> {
    let n_cells = check_samples(samples)?;
    let sum_sq = sum_of_squares(samples, n_cells);
    let t_values = signed_t(samples, &sum_sq, &vec![1.0; samples.len()]);

    let dist = StudentsT::new(0.0, 1.0, (samples.len() - 1) as f64)
        .map_err(|e| DecodingError::Numerical(format!("Student t distribution: {}", e)))?;
    let p_values = t_values
        .iter()
        .map(|&t| {
            if t.is_nan() {
                f64::NAN
            } else {
                (2.0 * dist.sf(t.abs())).min(1.0)
            }
        })
        .collect();
    Ok(TTestResult { t_values, p_values })
}

/// Upper `1 - alpha` quantile of Student's t with `n_samples - 1` degrees of
/// freedom
pub fn threshold_from_alpha(alpha: f64, n_samples: usize) -> Result<f64> {
    if n_samples < 2 {
        return Err(DecodingError::InsufficientSubjects(n_samples));
    }
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(DecodingError::InvalidParameter(format!(
            "alpha must be in (0, 1), got {}",
            alpha
        )));
    }
    let dist = StudentsT::new(0.0, 1.0, (n_samples - 1) as f64)
        .map_err(|e| DecodingError::Numerical(format!("Student t distribution: {}", e)))?;
    Ok(dist.inverse_cdf(1.0 - alpha))
}

/// 4-connected components of the cells selected by `inside`
fn components<F: Fn(usize) -> bool>(shape: (usize, usize), inside: F) -> Vec<Vec<usize>> {
    let (n_rows, n_cols) = shape;
    let mut seen = vec![false; n_rows * n_cols];
    let mut found = Vec::new();
    for start in 0..n_rows * n_cols {
        if seen[start] || !inside(start) {
            continue;
        }
        seen[start] = true;
        let mut cells = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(cell) = queue.pop_front() {
            cells.push(cell);
            let (r, c) = (cell / n_cols, cell % n_cols);
            let mut neighbours = Vec::with_capacity(4);
            if r > 0 {
                neighbours.push(cell - n_cols);
            }
            if r + 1 < n_rows {
                neighbours.push(cell + n_cols);
            }
            if c > 0 {
                neighbours.push(cell - 1);
            }
            if c + 1 < n_cols {
                neighbours.push(cell + 1);
            }
            for next in neighbours {
                if !seen[next] && inside(next) {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        found.push(cells);
    }
    found
}

/// Positive clusters (t > threshold) followed by negative ones (t < -threshold)
fn find_clusters(t: &[f64], shape: (usize, usize), threshold: f64) -> Vec<(Vec<usize>, f64)> {
    let mut clusters = Vec::new();
    for sign in [1.0, -1.0] {
        for cells in components(shape, |i| sign * t[i] > threshold) {
            let mass = cells.iter().map(|&i| t[i]).sum();
            clusters.push((cells, mass));
        }
    }
    clusters
}

fn max_abs_mass(t: &[f64], shape: (usize, usize), threshold: f64) -> f64 {
    find_clusters(t, shape, threshold)
        .iter()
        .map(|(_, mass)| mass.abs())
        .fold(0.0, f64::max)
}

/// Sign vectors of the null distribution, identity first.
///
/// When `2^(n-1)` flips fit in `n_permutations` every flip pattern with the
/// last row fixed is enumerated; otherwise `n_permutations - 1` random
/// patterns follow the identity.
fn sign_flips(n_samples: usize, n_permutations: usize, seed: Option<u64>) -> Vec<Vec<f64>> {
    let exact = n_samples <= 64 && (1u128 << (n_samples - 1)) <= n_permutations as u128;
    if exact {
        let total = 1usize << (n_samples - 1);
        return (0..total)
            .map(|k| {
                (0..n_samples)
                    .map(|i| {
                        if i + 1 < n_samples && (k >> i) & 1 == 1 {
                            -1.0
                        } else {
                            1.0
                        }
                    })
                    .collect()
            })
            .collect();
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut flips = Vec::with_capacity(n_permutations);
    flips.push(vec![1.0; n_samples]);
    for _ in 1..n_permutations {
        flips.push(
            (0..n_samples)
                .map(|_| if rng.random::<bool>() { -1.0 } else { 1.0 })
                .collect(),
        );
    }
    flips
}

/// Two-tailed one-sample cluster permutation test on a regular
/// `shape.0 x shape.1` lattice.
///
/// Sign patterns are drawn up front, so running the permutations in
/// parallel gives the same result as the sequential loop.
pub fn permutation_cluster_1samp_test(
    samples: &[Vec<f64>],
    shape: (usize, usize),
    threshold: f64,
    n_permutations: usize,
    seed: Option<u64>,
    parallel: bool,
) -> Result<ClusterTestResult> {
    let n_cells = check_samples(samples)?;
    if n_cells != shape.0 * shape.1 {
        return Err(DecodingError::ShapeMismatch {
            path: "cluster test samples".to_string(),
            expected: vec![shape.0, shape.1],
            found: vec![n_cells],
        });
    }
    if n_permutations == 0 {
        return Err(DecodingError::InvalidParameter(
            "n_permutations must be at least 1".to_string(),
        ));
    }
    if samples.iter().flatten().any(|v| v.is_nan()) {
        return Err(DecodingError::InvalidParameter(
            "cluster test samples contain NaN".to_string(),
        ));
    }

    let sum_sq = sum_of_squares(samples, n_cells);
    let flips = sign_flips(samples.len(), n_permutations, seed);

    let t_obs = signed_t(samples, &sum_sq, &flips[0]);
    let observed = find_clusters(&t_obs, shape, threshold);

    let null_mass = |signs: &Vec<f64>| max_abs_mass(&signed_t(samples, &sum_sq, signs), shape, threshold);
    let h0: Vec<f64> = if parallel {
        flips.par_iter().map(null_mass).collect()
    } else {
        flips.iter().map(null_mass).collect()
    };

    let clusters = observed
        .into_iter()
        .map(|(cells, mass)| {
            let exceed = h0.iter().filter(|&&h| h >= mass.abs()).count();
            let mut mask = vec![false; n_cells];
            for cell in cells {
                mask[cell] = true;
            }
            Cluster {
                mask,
                mass,
                p_value: exceed as f64 / h0.len() as f64,
            }
        })
        .collect();

    Ok(ClusterTestResult {
        shape,
        threshold,
        t_obs,
        clusters,
        h0,
    })
}
