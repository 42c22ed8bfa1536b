//! Per-subject decoding over the frequency x time grid

use crate::artifact::{ScoreArray, ScoreArtifact};
use crate::classifier::{cross_val_auc, ClassifierParams};
use crate::config::{DecodingConfig, PcaBasis};
use crate::cv::StratifiedKFold;
use crate::error::{DecodingError, Result};
use crate::grid::FrequencyTimeGrid;
use crate::labels::derive_labels;
use crate::pca::{select_rank, Pca};
use crate::preprocess::{
    good_data_channels, maybe_decimate, pick_channels, prepare, select_contrast,
};
use crate::profile_scope;
use crate::report::ReportSink;
use crate::types::{Contrast, EpochSet, LogContext};
use chrono::Utc;
use nalgebra::DMatrix;

/// Spatial basis applied to every trial before CSP
enum Projection<'a> {
    /// Broadband basis; band-passed data is rotated without re-centering
    Subject(&'a Pca),
    Band(Pca),
    Identity,
}

impl Projection<'_> {
    fn apply(&self, epochs: &EpochSet) -> Vec<DMatrix<f64>> {
        match self {
            Self::Subject(pca) => epochs.epochs.iter().map(|e| pca.project(&e.data)).collect(),
            Self::Band(pca) => pca.transform_all(&epochs.data()),
            Self::Identity => epochs.epochs.iter().map(|e| e.data.clone()).collect(),
        }
    }
}

/// Cross-validated ROC-AUC of every frequency window and every
/// (frequency, time) cell for one subject, session and contrast.
///
/// The contrast is validated on the trials before any filtering or fitting,
/// so a bad partition fails fast.
pub fn decode_subject(
    epochs: &EpochSet,
    subject: &str,
    session: Option<&str>,
    contrast: &Contrast,
    grid: &FrequencyTimeGrid,
    cfg: &DecodingConfig,
    report: &dyn ReportSink,
) -> Result<ScoreArtifact> {
    let ctx = LogContext::task(subject, session, contrast);
    profile_scope!(format!("{} decoding", ctx));

    grid.check_times(epochs)?;
    let (epochs, _factor) = maybe_decimate(epochs, cfg.csp_quick, grid.max_freq(), &ctx);

    let picked = pick_channels(&epochs, cfg.datatype)?;
    let restricted = select_contrast(&picked, contrast);
    if restricted.is_empty() {
        return Err(DecodingError::InvalidParameter(format!(
            "no trial matches contrast {}",
            contrast
        )));
    }
    let labels = derive_labels(&restricted, contrast)?;

    let folds = StratifiedKFold::new(cfg.decoding_n_splits, cfg.csp_shuffle_cv, cfg.cv_seed())
        .split(&labels)?;

    // Rank over every good sensor type, then bounded by the picked channels
    let all_sensors = select_contrast(&good_data_channels(&epochs)?, contrast);
    let rank = select_rank(&all_sensors)?.min(restricted.n_channels());
    let subject_basis = match cfg.csp_pca {
        PcaBasis::Subject => {
            log::info!("{} Reducing data dimension via PCA; new rank: {}.", ctx, rank);
            Some(Pca::fit(&restricted.data(), rank)?)
        }
        PcaBasis::Band => {
            log::info!(
                "{} Reducing data dimension via PCA per band; new rank: {}.",
                ctx,
                rank
            );
            None
        }
        PcaBasis::Off => None,
    };

    let params = ClassifierParams::from(cfg);
    let (n_freq, n_time) = (grid.n_freq_windows(), grid.n_time_windows());
    let mut freq_scores = vec![0.0; n_freq];
    let mut freq_scores_std = vec![0.0; n_freq];
    let mut tf_scores = ScoreArray::filled(vec![n_freq, n_time], 0.0);

    for (f, (fmin, fmax)) in grid.freq_ranges().into_iter().enumerate() {
        let prepared = prepare(&epochs, contrast, fmin, fmax, cfg.datatype, cfg.filter_order)?;

        let projection = match (&subject_basis, cfg.csp_pca) {
            (Some(pca), _) => Projection::Subject(pca),
            (None, PcaBasis::Band) => Projection::Band(Pca::fit(&prepared.epochs.data(), rank)?),
            (None, _) => Projection::Identity,
        };

        let scores = cross_val_auc(
            &projection.apply(&prepared.epochs),
            &prepared.labels,
            &params,
            &folds,
        )?;
        freq_scores[f] = scores.mean();
        freq_scores_std[f] = scores.std();
        log::info!(
            "{} Freqs (Hz): {}–{}, full epoch: roc-auc {:.3}",
            ctx,
            fmin,
            fmax,
            freq_scores[f]
        );

        for (t, (tmin, tmax)) in grid.time_ranges().into_iter().enumerate() {
            log::info!(
                "{} Contrast: {}, Freqs (Hz): {}–{}, Times (sec): {}–{}",
                ctx,
                contrast,
                fmin,
                fmax,
                tmin,
                tmax
            );
            let cropped = prepared.epochs.crop(tmin, tmax)?;
            let scores = cross_val_auc(
                &projection.apply(&cropped),
                &prepared.labels,
                &params,
                &folds,
            )?;
            tf_scores.set2(f, t, scores.mean());
        }
    }

    let artifact = ScoreArtifact {
        subject: subject.to_string(),
        session: session.map(str::to_string),
        contrast: contrast.clone(),
        freq_scores: ScoreArray::vector(freq_scores),
        freq_scores_std: ScoreArray::vector(freq_scores_std),
        tf_scores,
        created_at: Utc::now(),
    };
    report.subject_scores(&ctx, grid, &artifact);
    Ok(artifact)
}
