//! Common Spatial Patterns for two classes
//!
//! Spatial filters maximize the variance of one class while minimizing the
//! variance of the other. They are the generalized eigenvectors of
//! `C0 w = lambda (C0 + C1) w`, found by whitening the composite covariance
//! and diagonalizing the whitened class-0 covariance.

use crate::config::Regularization;
use crate::error::{DecodingError, Result};
use crate::linalg::{concat_covariance, ledoit_wolf, sorted_eigen};
use nalgebra::{DMatrix, DVector};

/// Composite eigenvalues below this fraction of the largest are discarded
const WHITENING_TOL: f64 = 1e-10;

/// Fitted CSP filters
#[derive(Debug, Clone)]
pub struct Csp {
    /// n_components x n_channels
    filters: DMatrix<f64>,
    eigenvalues: Vec<f64>,
}

/// Covariance of one class, regularized as requested
fn class_covariance(trials: &[&DMatrix<f64>], reg: Regularization) -> Result<DMatrix<f64>> {
    let (cov, mean, n) = concat_covariance(trials)?;
    match reg {
        Regularization::None => Ok(cov),
        Regularization::Shrinkage(alpha) => {
            let p = cov.nrows();
            let mu = cov.trace() / p as f64;
            Ok(cov * (1.0 - alpha) + DMatrix::identity(p, p) * (alpha * mu))
        }
        Regularization::LedoitWolf => {
            let mut centered = DMatrix::zeros(mean.len(), n);
            let mut offset = 0;
            for t in trials {
                for c in 0..t.ncols() {
                    centered.set_column(offset, &(t.column(c) - &mean));
                    offset += 1;
                }
            }
            Ok(ledoit_wolf(&centered))
        }
    }
}

impl Csp {
    /// Fit on channels x times trials with labels in {0, 1}.
    ///
    /// `n_components` is clamped to the number of usable whitened dimensions.
    pub fn fit(
        trials: &[&DMatrix<f64>],
        labels: &[u8],
        n_components: usize,
        reg: Regularization,
    ) -> Result<Self> {
        if trials.len() != labels.len() {
            return Err(DecodingError::InvalidParameter(format!(
                "{} trials but {} labels",
                trials.len(),
                labels.len()
            )));
        }
        let class = |k: u8| -> Vec<&DMatrix<f64>> {
            trials
                .iter()
                .zip(labels)
                .filter(|(_, &l)| l == k)
                .map(|(t, _)| *t)
                .collect()
        };
        let (class0, class1) = (class(0), class(1));
        if class0.is_empty() || class1.is_empty() {
            return Err(DecodingError::InvalidParameter(
                "CSP needs trials of both classes".to_string(),
            ));
        }

        let c0 = class_covariance(&class0, reg)?;
        let c1 = class_covariance(&class1, reg)?;
        let composite = &c0 + &c1;

        let (values, vectors) = sorted_eigen(composite)?;
        let max = values.first().copied().unwrap_or(0.0);
        if max <= 0.0 {
            return Err(DecodingError::Numerical(
                "composite covariance is zero".to_string(),
            ));
        }
        let kept = values.iter().filter(|&&v| v > max * WHITENING_TOL).count();
        let n_channels = c0.nrows();

        // Rows of the whitening matrix: u_i^T / sqrt(d_i)
        let whitening = DMatrix::from_fn(kept, n_channels, |r, c| {
            vectors[(c, r)] / values[r].sqrt()
        });
        let s0 = &whitening * &c0 * whitening.transpose();
        let (lambdas, rotation) = sorted_eigen(s0)?;

        let mut order: Vec<usize> = (0..kept).collect();
        order.sort_by(|&a, &b| {
            let da = (lambdas[a] - 0.5).abs();
            let db = (lambdas[b] - 0.5).abs();
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });
        let n_components = n_components.clamp(1, kept);
        order.truncate(n_components);

        let unmixing = rotation.transpose() * whitening;
        let filters = DMatrix::from_fn(n_components, n_channels, |r, c| unmixing[(order[r], c)]);
        let eigenvalues = order.iter().map(|&i| lambdas[i]).collect();

        Ok(Self { filters, eigenvalues })
    }

    pub fn n_components(&self) -> usize {
        self.filters.nrows()
    }

    pub fn filters(&self) -> &DMatrix<f64> {
        &self.filters
    }

    /// Class-0 variance fraction of each kept filter
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Log of the average power of each filtered component
    pub fn transform(&self, trial: &DMatrix<f64>) -> DVector<f64> {
        let sources = &self.filters * trial;
        let n_times = sources.ncols().max(1) as f64;
        DVector::from_fn(sources.nrows(), |r, _| {
            let power = sources.row(r).norm_squared() / n_times;
            power.max(f64::MIN_POSITIVE).ln()
        })
    }

    /// Feature matrix, one row per trial
    pub fn transform_all(&self, trials: &[&DMatrix<f64>]) -> DMatrix<f64> {
        let mut features = DMatrix::zeros(trials.len(), self.n_components());
        for (i, trial) in trials.iter().enumerate() {
            features.set_row(i, &self.transform(trial).transpose());
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Class 0 is loud on channel 0, class 1 is loud on channel 2
    fn two_class_trials(rng: &mut StdRng) -> (Vec<DMatrix<f64>>, Vec<u8>) {
        let mut trials = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let label = (i % 2) as u8;
            let loud = if label == 0 { 0 } else { 2 };
            let trial = DMatrix::from_fn(4, 100, |r, _| {
                let gain = if r == loud { 4.0 } else { 1.0 };
                gain * rng.random_range(-1.0..1.0)
            });
            trials.push(trial);
            labels.push(label);
        }
        (trials, labels)
    }

    #[test]
    fn test_filters_isolate_discriminative_channels() {
        let mut rng = StdRng::seed_from_u64(7);
        let (trials, labels) = two_class_trials(&mut rng);
        let refs: Vec<&DMatrix<f64>> = trials.iter().collect();
        let csp = Csp::fit(&refs, &labels, 2, Regularization::None).unwrap();

        assert_eq!(csp.n_components(), 2);
        // The two extreme eigenvalues come first
        let ev = csp.eigenvalues();
        assert!(ev.iter().any(|&l| l > 0.8));
        assert!(ev.iter().any(|&l| l < 0.2));

        let f = csp.filters();
        for r in 0..2 {
            let row = f.row(r);
            let dominant = (0..4)
                .max_by(|&a, &b| row[a].abs().partial_cmp(&row[b].abs()).unwrap())
                .unwrap();
            assert!(dominant == 0 || dominant == 2);
        }
    }

    #[test]
    fn test_log_power_features_separate_classes() {
        let mut rng = StdRng::seed_from_u64(11);
        let (trials, labels) = two_class_trials(&mut rng);
        let refs: Vec<&DMatrix<f64>> = trials.iter().collect();
        let csp = Csp::fit(&refs, &labels, 2, Regularization::LedoitWolf).unwrap();
        let features = csp.transform_all(&refs);
        assert_eq!(features.shape(), (30, 2));

        let mean = |k: u8| -> f64 {
            let rows: Vec<f64> = (0..30)
                .filter(|&i| labels[i] == k)
                .map(|i| features[(i, 0)])
                .collect();
            rows.iter().sum::<f64>() / rows.len() as f64
        };
        assert!((mean(0) - mean(1)).abs() > 1.0);
    }

    #[test]
    fn test_components_clamped_to_rank() {
        let mut rng = StdRng::seed_from_u64(5);
        let (trials, labels) = two_class_trials(&mut rng);
        let refs: Vec<&DMatrix<f64>> = trials.iter().collect();
        let csp = Csp::fit(&refs, &labels, 10, Regularization::Shrinkage(0.1)).unwrap();
        assert_eq!(csp.n_components(), 4);
    }

    #[test]
    fn test_single_class_rejected() {
        let trials = vec![DMatrix::from_element(2, 10, 1.0); 4];
        let refs: Vec<&DMatrix<f64>> = trials.iter().collect();
        assert!(Csp::fit(&refs, &[0, 0, 0, 0], 2, Regularization::None).is_err());
    }
}
