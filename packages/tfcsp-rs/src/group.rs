//! Group-level statistics for one contrast

use crate::aggregate::load_and_stack;
use crate::artifact::{ArtifactStore, ScoreArray, ScoreKind};
use crate::bootstrap::{compute_conf_inter, AggregatedStats};
use crate::cluster::{
    permutation_cluster_1samp_test, threshold_from_alpha, ttest_1samp, ClusterTestResult,
    TTestResult,
};
use crate::config::DecodingConfig;
use crate::error::Result;
use crate::grid::FrequencyTimeGrid;
use crate::profile_scope;
use crate::report::ReportSink;
use crate::types::{Contrast, LogContext};
use serde::Serialize;

/// ROC-AUC of a classifier without information
pub const CHANCE: f64 = 0.5;

/// Everything group analysis derives for one contrast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResult {
    pub contrast: Contrast,
    pub centered_freqs: Vec<f64>,
    pub centered_times: Vec<f64>,
    pub freq_stats: AggregatedStats,
    /// NaN-aware mean of the tf maps
    pub tf_mean: ScoreArray,
    /// Subject x session slots entering the t-tests (no NaN)
    pub n_complete: usize,
    /// `None` when fewer than two complete tf maps exist
    pub tf_stats: Option<TfStatistics>,
    pub significant: bool,
}

/// Tests of the chance-centered tf maps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfStatistics {
    pub uncorrected: TTestResult,
    pub cluster: ClusterTestResult,
    /// Cluster-corrected p per cell, 1.0 outside every cluster
    pub corrected_p: Vec<f64>,
}

/// Average scores, bootstrap the frequency profile and test the tf maps.
///
/// Returns `Ok(None)` with a warning when fewer than two subject x session
/// slots are available; with fewer than two complete tf maps the result
/// carries the frequency statistics only.
pub fn group_analysis(
    store: &ArtifactStore,
    subjects: &[String],
    sessions: &[Option<String>],
    contrast: &Contrast,
    grid: &FrequencyTimeGrid,
    cfg: &DecodingConfig,
    report: &dyn ReportSink,
) -> Result<Option<GroupResult>> {
    let ctx = LogContext::group(contrast);
    log::info!("{} Running group analysis...", ctx);
    profile_scope!(format!("{} group analysis", ctx));

    let n_slots = subjects.len() * sessions.len().max(1);
    if n_slots < 2 {
        log::warn!(
            "{} We cannot run a group analysis with just {} subject/session.",
            ctx,
            n_slots
        );
        return Ok(None);
    }

    let (n_freq, n_time) = (grid.n_freq_windows(), grid.n_time_windows());

    let freq_stack = load_and_stack(
        store,
        subjects,
        sessions,
        contrast,
        ScoreKind::FreqScores,
        &[n_freq],
    )?;
    let freq_stats = compute_conf_inter(&freq_stack, cfg.n_boot, cfg.random_state)?;

    let tf_shape = [n_freq, n_time];
    let tf_stack = load_and_stack(
        store,
        subjects,
        sessions,
        contrast,
        ScoreKind::TfScores,
        &tf_shape,
    )?;
    let tf_mean = tf_stack.nan_mean();

    let samples: Vec<Vec<f64>> = tf_stack
        .complete_rows()
        .into_iter()
        .map(|row| row.into_iter().map(|v| v - CHANCE).collect())
        .collect();
    let dropped = tf_stack.n_slots() - samples.len();
    if dropped > 0 {
        log::warn!(
            "{} {} subject/session tf map(s) with NaN left out of the statistical tests",
            ctx,
            dropped
        );
    }
    let tf_stats = if samples.len() < 2 {
        log::warn!(
            "{} Only {} complete tf map(s); skipping the statistical tests.",
            ctx,
            samples.len()
        );
        None
    } else {
        Some(run_tf_tests(&samples, (n_freq, n_time), cfg, &ctx)?)
    };
    let significant = tf_stats
        .as_ref()
        .is_some_and(|s| s.cluster.significant(cfg.cluster_stats_alpha));
    if significant {
        log::info!(
            "{} At least one cluster is significant at the level {}.",
            ctx,
            cfg.cluster_stats_alpha
        );
    } else if tf_stats.is_some() {
        log::info!(
            "{} The results are not significant. Try increasing the number of subjects.",
            ctx
        );
    }

    let result = GroupResult {
        contrast: contrast.clone(),
        centered_freqs: grid.centered_freqs(),
        centered_times: grid.centered_times(),
        freq_stats,
        tf_mean,
        n_complete: samples.len(),
        tf_stats,
        significant,
    };
    report.group_results(&ctx, grid, &result);
    log::info!("{} Group statistic analysis finished.", ctx);
    Ok(Some(result))
}

fn run_tf_tests(
    samples: &[Vec<f64>],
    shape: (usize, usize),
    cfg: &DecodingConfig,
    ctx: &LogContext,
) -> Result<TfStatistics> {
    let uncorrected = ttest_1samp(samples)?;
    let threshold = threshold_from_alpha(cfg.cluster_t_dist_alpha_thres, samples.len())?;
    let cluster = permutation_cluster_1samp_test(
        samples,
        shape,
        threshold,
        cfg.n_permutations,
        cfg.random_state,
        cfg.parallel_permutations,
    )?;
    log::info!("{} Permutations performed successfully", ctx);
    let corrected_p = cluster.corrected_p_grid();
    Ok(TfStatistics {
        uncorrected,
        cluster,
        corrected_p,
    })
}
