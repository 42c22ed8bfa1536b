//! CSP + LDA pipeline scored by cross-validated ROC AUC

use crate::config::{DecodingConfig, Regularization};
use crate::csp::Csp;
use crate::cv::Fold;
use crate::error::{DecodingError, Result};
use crate::lda::Lda;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Hyper-parameters of the CSP + LDA pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    pub n_components: usize,
    pub reg: Regularization,
}

impl From<&DecodingConfig> for ClassifierParams {
    fn from(cfg: &DecodingConfig) -> Self {
        Self {
            n_components: cfg.csp_n_components,
            reg: cfg.csp_reg,
        }
    }
}

/// Fitted spatial filter followed by a linear discriminant
#[derive(Debug, Clone)]
pub struct CspLda {
    csp: Csp,
    lda: Lda,
}

impl CspLda {
    pub fn fit(trials: &[&DMatrix<f64>], labels: &[u8], params: &ClassifierParams) -> Result<Self> {
        let csp = Csp::fit(trials, labels, params.n_components, params.reg)?;
        let features = csp.transform_all(trials);
        let lda = Lda::fit(&features, labels)?;
        Ok(Self { csp, lda })
    }

    pub fn decision_function(&self, trials: &[&DMatrix<f64>]) -> Vec<f64> {
        self.lda.decision_function(&self.csp.transform_all(trials))
    }
}

/// Area under the ROC curve with class 1 as positive.
///
/// Computed as the normalized Mann-Whitney U statistic; tied scores receive
/// their average rank.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64> {
    if labels.len() != scores.len() {
        return Err(DecodingError::InvalidParameter(format!(
            "{} labels but {} scores",
            labels.len(),
            scores.len()
        )));
    }
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(DecodingError::InvalidParameter(
            "ROC AUC is undefined when only one class is present".to_string(),
        ));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(DecodingError::Numerical("NaN decision score".to_string()));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

/// Per-fold scores of one cross-validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    pub folds: Vec<f64>,
}

impl CvScores {
    pub fn mean(&self) -> f64 {
        if self.folds.is_empty() {
            return f64::NAN;
        }
        self.folds.iter().sum::<f64>() / self.folds.len() as f64
    }

    /// Population standard deviation
    pub fn std(&self) -> f64 {
        if self.folds.is_empty() {
            return f64::NAN;
        }
        let mean = self.mean();
        let var = self.folds.iter().map(|s| (s - mean).powi(2)).sum::<f64>()
            / self.folds.len() as f64;
        var.sqrt()
    }
}

/// Fit on each fold's training trials and score its test trials
pub fn cross_val_auc(
    trials: &[DMatrix<f64>],
    labels: &[u8],
    params: &ClassifierParams,
    folds: &[Fold],
) -> Result<CvScores> {
    if trials.len() != labels.len() {
        return Err(DecodingError::InvalidParameter(format!(
            "{} trials but {} labels",
            trials.len(),
            labels.len()
        )));
    }
    let mut scores = Vec::with_capacity(folds.len());
    for fold in folds {
        let train: Vec<&DMatrix<f64>> = fold.train.iter().map(|&i| &trials[i]).collect();
        let train_y: Vec<u8> = fold.train.iter().map(|&i| labels[i]).collect();
        let test: Vec<&DMatrix<f64>> = fold.test.iter().map(|&i| &trials[i]).collect();
        let test_y: Vec<u8> = fold.test.iter().map(|&i| labels[i]).collect();

        let model = CspLda::fit(&train, &train_y, params)?;
        scores.push(roc_auc(&test_y, &model.decision_function(&test))?);
    }
    Ok(CvScores { folds: scores })
}
