//! Per-subject score artifacts and their on-disk store
//!
//! Every (subject, session, contrast) decoding task yields three arrays,
//! each persisted as a standalone JSON file so that group analysis can load
//! them independently and substitute missing ones.

use crate::error::{DecodingError, Result};
use crate::types::Contrast;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Dense row-major N-d array of scores.
///
/// NaN values are written as `null` since JSON has no NaN literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreArray {
    pub shape: Vec<usize>,
    #[serde(with = "nan_as_null")]
    pub data: Vec<f64>,
}

impl ScoreArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(DecodingError::InvalidParameter(format!(
                "array of shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn filled(shape: Vec<usize>, value: f64) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element of a 2-D array
    pub fn get2(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.shape[1] + col]
    }

    pub fn set2(&mut self, row: usize, col: usize, value: f64) {
        let n_cols = self.shape[1];
        self.data[row * n_cols + col] = value;
    }

    pub fn nan_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }
}

/// Which of the three per-task arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    FreqScores,
    FreqScoresStd,
    TfScores,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 3] = [Self::FreqScores, Self::FreqScoresStd, Self::TfScores];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreqScores => "freq_scores",
            Self::FreqScoresStd => "freq_scores_std",
            Self::TfScores => "tf_scores",
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one decoding task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreArtifact {
    pub subject: String,
    pub session: Option<String>,
    pub contrast: Contrast,
    /// Mean AUC per frequency window, full epoch
    pub freq_scores: ScoreArray,
    /// Fold standard deviation per frequency window
    pub freq_scores_std: ScoreArray,
    /// Mean AUC per (frequency, time) cell
    pub tf_scores: ScoreArray,
    pub created_at: DateTime<Utc>,
}

impl ScoreArtifact {
    pub fn array(&self, kind: ScoreKind) -> &ScoreArray {
        match kind {
            ScoreKind::FreqScores => &self.freq_scores,
            ScoreKind::FreqScoresStd => &self.freq_scores_std,
            ScoreKind::TfScores => &self.tf_scores,
        }
    }
}

/// Directory of score arrays keyed by subject, session, contrast and kind
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `sub-<s>[_ses-<x>]_contrast-<A>_vs_<B>_<kind>.json`
    pub fn path(
        &self,
        subject: &str,
        session: Option<&str>,
        contrast: &Contrast,
        kind: ScoreKind,
    ) -> PathBuf {
        let mut name = format!("sub-{}", subject);
        if let Some(ses) = session {
            name.push_str(&format!("_ses-{}", ses));
        }
        name.push_str(&format!("_contrast-{}_{}.json", contrast.key(), kind));
        self.root.join(name)
    }

    /// Write all three arrays of an artifact
    pub fn save(&self, artifact: &ScoreArtifact) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.root)?;
        let mut written = Vec::with_capacity(ScoreKind::ALL.len());
        for kind in ScoreKind::ALL {
            let path = self.path(
                &artifact.subject,
                artifact.session.as_deref(),
                &artifact.contrast,
                kind,
            );
            let json = serde_json::to_string(artifact.array(kind))?;
            std::fs::write(&path, json)?;
            log::debug!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Read one array; a missing file is `MissingArtifact`
    pub fn load(
        &self,
        subject: &str,
        session: Option<&str>,
        contrast: &Contrast,
        kind: ScoreKind,
    ) -> Result<ScoreArray> {
        let path = self.path(subject, session, contrast, kind);
        if !path.exists() {
            return Err(DecodingError::MissingArtifact(path.display().to_string()));
        }
        let text = std::fs::read_to_string(&path)?;
        let array: ScoreArray = serde_json::from_str(&text)?;
        if array.shape.iter().product::<usize>() != array.data.len() {
            return Err(DecodingError::ShapeMismatch {
                path: path.display().to_string(),
                expected: array.shape.clone(),
                found: vec![array.data.len()],
            });
        }
        Ok(array)
    }
}

/// Serde adapter writing NaN as `null`
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(data.iter().map(|v| if v.is_nan() { None } else { Some(*v) }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConditionGroup;
    use tempfile::TempDir;

    fn contrast() -> Contrast {
        Contrast::new(
            ConditionGroup::new("Famous", [5, 6]),
            ConditionGroup::new("Scrambled", [17]),
        )
    }

    fn artifact(subject: &str, session: Option<&str>) -> ScoreArtifact {
        let mut tf = ScoreArray::filled(vec![2, 3], 0.5);
        tf.set2(1, 2, f64::NAN);
        ScoreArtifact {
            subject: subject.to_string(),
            session: session.map(str::to_string),
            contrast: contrast(),
            freq_scores: ScoreArray::vector(vec![0.7, 0.6]),
            freq_scores_std: ScoreArray::vector(vec![0.05, 0.02]),
            tf_scores: tf,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_paths_encode_identity() {
        let store = ArtifactStore::new("/out");
        let p = store.path("01", Some("meg"), &contrast(), ScoreKind::TfScores);
        assert_eq!(
            p,
            PathBuf::from("/out/sub-01_ses-meg_contrast-Famous_vs_Scrambled_tf_scores.json")
        );
        let p = store.path("01", None, &contrast(), ScoreKind::FreqScoresStd);
        assert!(p.ends_with("sub-01_contrast-Famous_vs_Scrambled_freq_scores_std.json"));
    }

    #[test]
    fn test_save_then_load_keeps_nan() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let written = store.save(&artifact("02", None)).unwrap();
        assert_eq!(written.len(), 3);

        let tf = store
            .load("02", None, &contrast(), ScoreKind::TfScores)
            .unwrap();
        assert_eq!(tf.shape, vec![2, 3]);
        assert!(tf.get2(1, 2).is_nan());
        assert_eq!(tf.get2(0, 0), 0.5);
        assert_eq!(tf.nan_count(), 1);
    }

    #[test]
    fn test_missing_file_is_typed() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store
            .load("03", None, &contrast(), ScoreKind::FreqScores)
            .unwrap_err();
        assert!(matches!(err, DecodingError::MissingArtifact(_)));
    }

    #[test]
    fn test_new_checks_length() {
        assert!(ScoreArray::new(vec![2, 2], vec![0.0; 3]).is_err());
        assert!(ScoreArray::new(vec![2, 2], vec![0.0; 4]).is_ok());
    }
}
