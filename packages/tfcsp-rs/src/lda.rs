use crate::error::{DecodingError, Result};
use nalgebra::{DMatrix, DVector};

/// Binary linear discriminant analysis with a shared covariance
#[derive(Debug, Clone)]
pub struct Lda {
    coef: DVector<f64>,
    intercept: f64,
}

impl Lda {
    /// Fit on a trials x features matrix with labels in {0, 1}.
    ///
    /// The pooled within-class covariance is inverted through its SVD, so
    /// collinear features are tolerated.
    pub fn fit(features: &DMatrix<f64>, labels: &[u8]) -> Result<Self> {
        let (n, p) = features.shape();
        if n != labels.len() {
            return Err(DecodingError::InvalidParameter(format!(
                "{} feature rows but {} labels",
                n,
                labels.len()
            )));
        }

        let mut means = [DVector::zeros(p), DVector::zeros(p)];
        let mut counts = [0usize; 2];
        for (i, &label) in labels.iter().enumerate() {
            let k = usize::from(label != 0);
            means[k] += features.row(i).transpose();
            counts[k] += 1;
        }
        if counts.contains(&0) {
            return Err(DecodingError::InvalidParameter(
                "LDA needs samples of both classes".to_string(),
            ));
        }
        for k in 0..2 {
            means[k] /= counts[k] as f64;
        }

        let mut within = DMatrix::zeros(p, p);
        for (i, &label) in labels.iter().enumerate() {
            let d = features.row(i).transpose() - &means[usize::from(label != 0)];
            within += &d * d.transpose();
        }
        within /= (n.saturating_sub(2)).max(1) as f64;

        let eps = within.norm() * 1e-10;
        let inverse = within
            .pseudo_inverse(eps)
            .map_err(|e| DecodingError::Numerical(format!("LDA covariance inversion: {}", e)))?;

        let diff = &means[1] - &means[0];
        let coef = inverse * diff;
        let midpoint = (&means[0] + &means[1]) * 0.5;
        let prior_log_odds = (counts[1] as f64 / counts[0] as f64).ln();
        let intercept = -coef.dot(&midpoint) + prior_log_odds;

        Ok(Self { coef, intercept })
    }

    /// Signed distance to the boundary; positive values favour class 1
    pub fn decision_function(&self, features: &DMatrix<f64>) -> Vec<f64> {
        (0..features.nrows())
            .map(|i| features.row(i).transpose().dot(&self.coef) + self.intercept)
            .collect()
    }

    pub fn coef(&self) -> &DVector<f64> {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}
