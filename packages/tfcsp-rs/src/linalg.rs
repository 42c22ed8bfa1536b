//! Covariance estimation and symmetric eigendecomposition helpers

use crate::error::{DecodingError, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Channel covariance of trials concatenated along time.
///
/// Returns the covariance (normalized by `n - 1`), the per-channel mean and
/// the number of pooled samples.
pub fn concat_covariance(trials: &[&DMatrix<f64>]) -> Result<(DMatrix<f64>, DVector<f64>, usize)> {
    let n_channels = trials.first().map(|t| t.nrows()).ok_or_else(|| {
        DecodingError::InvalidParameter("covariance of an empty trial set".to_string())
    })?;
    let n_samples: usize = trials.iter().map(|t| t.ncols()).sum();
    if n_samples < 2 {
        return Err(DecodingError::InvalidParameter(format!(
            "covariance needs at least 2 samples, got {}",
            n_samples
        )));
    }

    let mut mean = DVector::zeros(n_channels);
    for t in trials {
        for c in 0..t.ncols() {
            mean += t.column(c);
        }
    }
    mean /= n_samples as f64;

    let mut cov = DMatrix::zeros(n_channels, n_channels);
    for t in trials {
        let mut centered = (*t).clone();
        for mut col in centered.column_iter_mut() {
            col -= &mean;
        }
        cov += &centered * centered.transpose();
    }
    cov /= (n_samples - 1) as f64;
    Ok((cov, mean, n_samples))
}

/// Ledoit-Wolf shrinkage towards `mu * I` with `mu = trace / p`.
///
/// `centered` holds the demeaned samples as columns (p x n).
pub fn ledoit_wolf(centered: &DMatrix<f64>) -> DMatrix<f64> {
    let (p, n) = (centered.nrows(), centered.ncols());
    let emp = centered * centered.transpose() / n as f64;
    let mu = emp.trace() / p as f64;

    let mut target = DMatrix::identity(p, p);
    target *= mu;
    let delta = (&emp - &target).norm_squared() / p as f64;

    let mut beta = 0.0;
    for c in 0..n {
        let x = centered.column(c);
        let outer = &x * x.transpose();
        beta += (&outer - &emp).norm_squared();
    }
    beta /= (p * n * n) as f64;

    let shrinkage = if delta > 0.0 { (beta / delta).min(1.0) } else { 1.0 };
    emp * (1.0 - shrinkage) + target * shrinkage
}

/// Eigendecomposition of a symmetric matrix, eigenvalues in descending order.
///
/// Eigenvectors are the columns of the returned matrix.
pub fn sorted_eigen(matrix: DMatrix<f64>) -> Result<(Vec<f64>, DMatrix<f64>)> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(DecodingError::Numerical(
            "non-finite value in matrix passed to eigendecomposition".to_string(),
        ));
    }
    let n = matrix.nrows();
    let eigen = SymmetricEigen::new(matrix);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let values = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let vectors = DMatrix::from_fn(n, n, |r, c| eigen.eigenvectors[(r, order[c])]);
    Ok((values, vectors))
}
