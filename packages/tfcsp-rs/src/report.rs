use crate::artifact::ScoreArtifact;
use crate::grid::FrequencyTimeGrid;
use crate::group::GroupResult;
use crate::types::LogContext;

/// Receiver of computed scores and statistics, e.g. a figure renderer.
///
/// Implementations only get shared references and cannot alter the arrays.
pub trait ReportSink: Send + Sync {
    fn subject_scores(&self, ctx: &LogContext, grid: &FrequencyTimeGrid, artifact: &ScoreArtifact);

    fn group_results(&self, ctx: &LogContext, grid: &FrequencyTimeGrid, result: &GroupResult);
}

/// Writes a textual summary of every product to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReport;

fn fmt_scores(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{:.3}", v)).collect();
    format!("[{}]", parts.join(", "))
}

impl ReportSink for LogReport {
    fn subject_scores(&self, ctx: &LogContext, grid: &FrequencyTimeGrid, artifact: &ScoreArtifact) {
        for (i, (fmin, fmax)) in grid.freq_ranges().into_iter().enumerate() {
            log::info!(
                "{} {}–{} Hz: roc-auc {:.3} ± {:.3}",
                ctx,
                fmin,
                fmax,
                artifact.freq_scores.data[i],
                artifact.freq_scores_std.data[i]
            );
        }
        for f in 0..grid.n_freq_windows() {
            let row: Vec<f64> = (0..grid.n_time_windows())
                .map(|t| artifact.tf_scores.get2(f, t))
                .collect();
            log::debug!("{} tf_scores[{}] = {}", ctx, f, fmt_scores(&row));
        }
    }

    fn group_results(&self, ctx: &LogContext, _grid: &FrequencyTimeGrid, result: &GroupResult) {
        log::info!(
            "{} Frequency roc-auc over {} slots: mean {} se {}",
            ctx,
            result.freq_stats.n,
            fmt_scores(&result.freq_stats.mean),
            fmt_scores(&result.freq_stats.se)
        );
        match &result.tf_stats {
            Some(stats) => log::info!(
                "{} We found {} clusters with p-values {}",
                ctx,
                stats.cluster.clusters.len(),
                fmt_scores(&stats.cluster.cluster_p_values())
            ),
            None => log::info!(
                "{} {} complete tf map(s), no cluster test",
                ctx,
                result.n_complete
            ),
        }
    }
}
