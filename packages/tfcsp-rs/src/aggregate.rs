//! Loading and NaN-aware averaging of per-subject score arrays

use crate::artifact::{ArtifactStore, ScoreArray, ScoreKind};
use crate::error::{DecodingError, Result};
use crate::types::{Contrast, LogContext};

/// Subject x session slices of one score kind, stacked along a leading axis
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreStack {
    /// Shape of every slice
    pub shape: Vec<usize>,
    pub slots: Vec<ScoreArray>,
    /// `sub-<s>[_ses-<x>]` of each slot
    pub labels: Vec<String>,
}

impl ScoreStack {
    pub fn n_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slice_len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Values of flat cell `index` across all slots
    pub fn cell(&self, index: usize) -> Vec<f64> {
        self.slots.iter().map(|s| s.data[index]).collect()
    }

    /// Mean across slots ignoring NaN; cells with no finite value stay NaN
    pub fn nan_mean(&self) -> ScoreArray {
        let data = (0..self.slice_len())
            .map(|i| {
                let (sum, n) = self
                    .slots
                    .iter()
                    .map(|s| s.data[i])
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
                if n == 0 {
                    f64::NAN
                } else {
                    sum / n as f64
                }
            })
            .collect();
        ScoreArray {
            shape: self.shape.clone(),
            data,
        }
    }

    /// Slots without any NaN, as rows of flat values
    pub fn complete_rows(&self) -> Vec<Vec<f64>> {
        self.slots
            .iter()
            .filter(|s| !s.data.iter().any(|v| v.is_nan()))
            .map(|s| s.data.clone())
            .collect()
    }
}

fn slot_label(subject: &str, session: Option<&str>) -> String {
    match session {
        Some(ses) => format!("sub-{}_ses-{}", subject, ses),
        None => format!("sub-{}", subject),
    }
}

/// Load one score kind for every subject x session.
///
/// A slice that is missing, unreadable, malformed or wrongly shaped becomes
/// an all-NaN slot and a warning.
pub fn load_and_stack(
    store: &ArtifactStore,
    subjects: &[String],
    sessions: &[Option<String>],
    contrast: &Contrast,
    kind: ScoreKind,
    expected_shape: &[usize],
) -> Result<ScoreStack> {
    let ctx = LogContext::group(contrast);
    let default_sessions = [None];
    let sessions = if sessions.is_empty() {
        &default_sessions[..]
    } else {
        sessions
    };

    let mut slots = Vec::with_capacity(subjects.len() * sessions.len());
    let mut labels = Vec::with_capacity(slots.capacity());
    for subject in subjects {
        for session in sessions {
            let session = session.as_deref();
            let label = slot_label(subject, session);
            let loaded = store
                .load(subject, session, contrast, kind)
                .and_then(|array| {
                    if array.shape == expected_shape {
                        Ok(array)
                    } else {
                        Err(DecodingError::ShapeMismatch {
                            path: store
                                .path(subject, session, contrast, kind)
                                .display()
                                .to_string(),
                            expected: expected_shape.to_vec(),
                            found: array.shape,
                        })
                    }
                });

            let array = match loaded {
                Ok(array) => {
                    let nans = array.nan_count();
                    if nans > 0 {
                        log::warn!(
                            "{} {} {} contains {} NaN value(s)",
                            ctx,
                            label,
                            kind,
                            nans
                        );
                    }
                    array
                }
                Err(e) => {
                    log::warn!("{} {}: {}; using NaN instead", ctx, label, e);
                    ScoreArray::filled(expected_shape.to_vec(), f64::NAN)
                }
            };
            slots.push(array);
            labels.push(label);
        }
    }

    Ok(ScoreStack {
        shape: expected_shape.to_vec(),
        slots,
        labels,
    })
}

/// NaN-aware mean of [`load_and_stack`] across subjects and sessions
pub fn load_and_average(
    store: &ArtifactStore,
    subjects: &[String],
    sessions: &[Option<String>],
    contrast: &Contrast,
    kind: ScoreKind,
    expected_shape: &[usize],
) -> Result<ScoreArray> {
    Ok(load_and_stack(store, subjects, sessions, contrast, kind, expected_shape)?.nan_mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ScoreArtifact;
    use crate::types::ConditionGroup;
    use chrono::Utc;
    use tempfile::TempDir;

    fn contrast() -> Contrast {
        Contrast::new(ConditionGroup::new("a", [1]), ConditionGroup::new("b", [2]))
    }

    fn save(store: &ArtifactStore, subject: &str, freq: Vec<f64>, tf_shape: Vec<usize>) {
        let n = freq.len();
        store
            .save(&ScoreArtifact {
                subject: subject.to_string(),
                session: None,
                contrast: contrast(),
                freq_scores: ScoreArray::vector(freq),
                freq_scores_std: ScoreArray::vector(vec![0.0; n]),
                tf_scores: ScoreArray::filled(tf_shape, 0.6),
                created_at: Utc::now(),
            })
            .unwrap();
    }

    fn subjects(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_subject_becomes_nan_slot() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        save(&store, "01", vec![0.6, 0.8], vec![2, 2]);
        save(&store, "02", vec![0.8, 1.0], vec![2, 2]);

        let ids = subjects(&["01", "02", "03"]);
        let stack =
            load_and_stack(&store, &ids, &[], &contrast(), ScoreKind::FreqScores, &[2]).unwrap();
        assert_eq!(stack.n_slots(), 3);
        assert!(stack.slots[2].data.iter().all(|v| v.is_nan()));
        assert_eq!(stack.labels[2], "sub-03");

        let mean = stack.nan_mean();
        assert!((mean.data[0] - 0.7).abs() < 1e-12);
        assert!((mean.data[1] - 0.9).abs() < 1e-12);
        assert_eq!(stack.complete_rows().len(), 2);
    }

    #[test]
    fn test_shape_mismatch_becomes_nan_slot() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        save(&store, "01", vec![0.6, 0.8], vec![2, 3]);
        save(&store, "02", vec![0.6, 0.8], vec![2, 2]);

        let ids = subjects(&["01", "02"]);
        let avg =
            load_and_average(&store, &ids, &[], &contrast(), ScoreKind::TfScores, &[2, 3]).unwrap();
        assert!(avg.data.iter().all(|&v| (v - 0.6).abs() < 1e-12));

        let stack =
            load_and_stack(&store, &ids, &[], &contrast(), ScoreKind::TfScores, &[2, 3]).unwrap();
        assert!(stack.slots[1].data.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_corrupt_artifact_becomes_nan_slot() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        save(&store, "01", vec![0.6, 0.8], vec![2, 2]);
        save(&store, "02", vec![0.8, 1.0], vec![2, 2]);
        let path = store.path("02", None, &contrast(), ScoreKind::FreqScores);
        std::fs::write(&path, r#"{"shape": [2], "data": [0.8,"#).unwrap();

        let ids = subjects(&["01", "02"]);
        let avg =
            load_and_average(&store, &ids, &[], &contrast(), ScoreKind::FreqScores, &[2]).unwrap();
        assert_eq!(avg.data, vec![0.6, 0.8]);
    }

    #[test]
    fn test_all_nan_cell_stays_nan() {
        let stack = ScoreStack {
            shape: vec![2],
            slots: vec![
                ScoreArray::vector(vec![f64::NAN, 1.0]),
                ScoreArray::vector(vec![f64::NAN, 0.0]),
            ],
            labels: vec!["sub-01".into(), "sub-02".into()],
        };
        let mean = stack.nan_mean();
        assert!(mean.data[0].is_nan());
        assert_eq!(mean.data[1], 0.5);
        assert_eq!(stack.cell(1), vec![1.0, 0.0]);
    }
}
