use crate::error::{DecodingError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Physical channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Mag,
    Grad,
    Eeg,
    Eog,
    Stim,
    Misc,
}

impl ChannelType {
    /// MEG and EEG sensors carry brain signal; everything else is auxiliary
    pub fn is_data(self) -> bool {
        matches!(self, Self::Mag | Self::Grad | Self::Eeg)
    }

    pub fn is_meg(self) -> bool {
        matches!(self, Self::Mag | Self::Grad)
    }
}

/// Recording modality of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datatype {
    Meg,
    #[default]
    Eeg,
}

/// Channel annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: ChannelType,
    #[serde(default)]
    pub bad: bool,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>, kind: ChannelType) -> Self {
        Self {
            name: name.into(),
            kind,
            bad: false,
        }
    }
}

/// One trial: channels x times plus its event code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub event_code: i32,
    #[serde(with = "matrix_rows")]
    pub data: DMatrix<f64>,
}

impl Epoch {
    pub fn new(event_code: i32, data: DMatrix<f64>) -> Self {
        Self { event_code, data }
    }
}

/// Ordered collection of trials sharing sampling rate, time axis and channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSet {
    pub sfreq: f64,
    /// Time of the first sample in seconds
    pub tmin: f64,
    pub channels: Vec<ChannelInfo>,
    pub epochs: Vec<Epoch>,
}

impl EpochSet {
    pub fn new(
        sfreq: f64,
        tmin: f64,
        channels: Vec<ChannelInfo>,
        epochs: Vec<Epoch>,
    ) -> Result<Self> {
        let set = Self {
            sfreq,
            tmin,
            channels,
            epochs,
        };
        set.validate()?;
        Ok(set)
    }

    /// Check that every epoch has one row per channel and the same length
    pub fn validate(&self) -> Result<()> {
        if !(self.sfreq.is_finite() && self.sfreq > 0.0) {
            return Err(DecodingError::InvalidParameter(format!(
                "sampling rate must be positive, got {}",
                self.sfreq
            )));
        }
        if !self.tmin.is_finite() {
            return Err(DecodingError::InvalidParameter(
                "epoch tmin must be finite".to_string(),
            ));
        }
        let n_times = self.n_times();
        for (i, epoch) in self.epochs.iter().enumerate() {
            if epoch.data.nrows() != self.channels.len() {
                return Err(DecodingError::InvalidParameter(format!(
                    "epoch {} has {} channels, expected {}",
                    i,
                    epoch.data.nrows(),
                    self.channels.len()
                )));
            }
            if epoch.data.ncols() != n_times {
                return Err(DecodingError::InvalidParameter(format!(
                    "epoch {} has {} samples, expected {}",
                    i,
                    epoch.data.ncols(),
                    n_times
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn n_times(&self) -> usize {
        self.epochs.first().map(|e| e.data.ncols()).unwrap_or(0)
    }

    /// Time of the last sample in seconds
    pub fn tmax(&self) -> f64 {
        self.tmin + (self.n_times().saturating_sub(1)) as f64 / self.sfreq
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.n_times())
            .map(|i| self.tmin + i as f64 / self.sfreq)
            .collect()
    }

    pub fn event_codes(&self) -> Vec<i32> {
        self.epochs.iter().map(|e| e.event_code).collect()
    }

    pub fn data(&self) -> Vec<&DMatrix<f64>> {
        self.epochs.iter().map(|e| &e.data).collect()
    }

    /// Channel types present among the channels, in a stable order
    pub fn channel_types(&self) -> BTreeSet<ChannelType> {
        self.channels.iter().map(|c| c.kind).collect()
    }

    /// Keep only the channels at `indices`, in the given order
    pub fn pick(&self, indices: &[usize]) -> Self {
        let channels = indices.iter().map(|&i| self.channels[i].clone()).collect();
        let epochs = self
            .epochs
            .iter()
            .map(|e| {
                let data = DMatrix::from_fn(indices.len(), e.data.ncols(), |r, c| {
                    e.data[(indices[r], c)]
                });
                Epoch::new(e.event_code, data)
            })
            .collect();
        Self {
            sfreq: self.sfreq,
            tmin: self.tmin,
            channels,
            epochs,
        }
    }

    /// Keep only the trials whose event code satisfies `keep`, preserving order
    pub fn select_events<F: Fn(i32) -> bool>(&self, keep: F) -> Self {
        Self {
            sfreq: self.sfreq,
            tmin: self.tmin,
            channels: self.channels.clone(),
            epochs: self
                .epochs
                .iter()
                .filter(|e| keep(e.event_code))
                .cloned()
                .collect(),
        }
    }

    /// Apply `f` to every trial's data matrix
    pub fn map_data<F>(&self, f: F) -> Self
    where
        F: Fn(&DMatrix<f64>) -> DMatrix<f64>,
    {
        Self {
            sfreq: self.sfreq,
            tmin: self.tmin,
            channels: self.channels.clone(),
            epochs: self
                .epochs
                .iter()
                .map(|e| Epoch::new(e.event_code, f(&e.data)))
                .collect(),
        }
    }

    /// Crop to the samples with `tmin <= t <= tmax` (both ends inclusive)
    pub fn crop(&self, tmin: f64, tmax: f64) -> Result<Self> {
        if tmax < tmin {
            return Err(DecodingError::InvalidParameter(format!(
                "crop tmax ({}) must not be below tmin ({})",
                tmax, tmin
            )));
        }
        // Half a sample of slack absorbs float error in edge times
        let slack = 0.5 / self.sfreq;
        let times = self.times();
        let start = times.iter().position(|&t| t >= tmin - slack);
        let end = times.iter().rposition(|&t| t <= tmax + slack);
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) if s <= e => (s, e),
            _ => {
                return Err(DecodingError::GridBounds {
                    tmin,
                    tmax,
                    epoch_tmin: self.tmin,
                    epoch_tmax: self.tmax(),
                })
            }
        };
        let n = end - start + 1;
        Ok(Self {
            sfreq: self.sfreq,
            tmin: times[start],
            channels: self.channels.clone(),
            epochs: self
                .epochs
                .iter()
                .map(|e| Epoch::new(e.event_code, e.data.columns(start, n).clone_owned()))
                .collect(),
        })
    }

    /// Keep every `factor`-th sample; a factor of 1 returns an identical copy
    pub fn decimate(&self, factor: usize) -> Self {
        if factor <= 1 {
            return self.clone();
        }
        let n_times = self.n_times();
        let kept: Vec<usize> = (0..n_times).step_by(factor).collect();
        Self {
            sfreq: self.sfreq / factor as f64,
            tmin: self.tmin,
            channels: self.channels.clone(),
            epochs: self
                .epochs
                .iter()
                .map(|e| {
                    let data = DMatrix::from_fn(e.data.nrows(), kept.len(), |r, c| {
                        e.data[(r, kept[c])]
                    });
                    Epoch::new(e.event_code, data)
                })
                .collect(),
        }
    }
}

/// One side of a contrast: a condition name and its event codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub name: String,
    pub event_codes: BTreeSet<i32>,
}

impl ConditionGroup {
    pub fn new<I: IntoIterator<Item = i32>>(name: impl Into<String>, codes: I) -> Self {
        Self {
            name: name.into(),
            event_codes: codes.into_iter().collect(),
        }
    }

    pub fn contains(&self, code: i32) -> bool {
        self.event_codes.contains(&code)
    }
}

/// Pair of condition groups being compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contrast {
    pub first: ConditionGroup,
    pub second: ConditionGroup,
}

impl Contrast {
    pub fn new(first: ConditionGroup, second: ConditionGroup) -> Self {
        Self { first, second }
    }

    /// Build a contrast from an event-id map with `/`-separated tags.
    ///
    /// A condition selects every event whose tag set contains all of the
    /// condition's tags, so `Famous` matches `Famous/First` and
    /// `Famous/Immediate`.
    pub fn from_event_id(
        event_id: &BTreeMap<String, i32>,
        first: &str,
        second: &str,
    ) -> Result<Self> {
        let select = |condition: &str| -> Result<ConditionGroup> {
            let wanted: BTreeSet<&str> = condition.split('/').collect();
            let codes: BTreeSet<i32> = event_id
                .iter()
                .filter(|(name, _)| {
                    let tags: BTreeSet<&str> = name.split('/').collect();
                    wanted.is_subset(&tags)
                })
                .map(|(_, &code)| code)
                .collect();
            if codes.is_empty() {
                return Err(DecodingError::InvalidParameter(format!(
                    "condition '{}' matches no event in the event_id map",
                    condition
                )));
            }
            Ok(ConditionGroup {
                name: condition.to_string(),
                event_codes: codes,
            })
        };
        Ok(Self::new(select(first)?, select(second)?))
    }

    pub fn contains(&self, code: i32) -> bool {
        self.first.contains(code) || self.second.contains(code)
    }

    /// File-name safe identifier, e.g. `Famous_vs_Scrambled`.
    ///
    /// Bytes other than ASCII alphanumerics and `-` are written as `~XX`
    /// hex, so distinct contrasts never share a key.
    pub fn key(&self) -> String {
        let escape = |s: &str| -> String {
            let mut out = String::with_capacity(s.len());
            for b in s.bytes() {
                if b.is_ascii_alphanumeric() || b == b'-' {
                    out.push(char::from(b));
                } else {
                    out.push_str(&format!("~{:02X}", b));
                }
            }
            out
        };
        format!("{}_vs_{}", escape(&self.first.name), escape(&self.second.name))
    }
}

impl fmt::Display for Contrast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {}", self.first.name, self.second.name)
    }
}

/// Identity attached to log lines: which subject, session and contrast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub subject: Option<String>,
    pub session: Option<String>,
    pub contrast: Option<String>,
}

impl LogContext {
    pub fn task(subject: &str, session: Option<&str>, contrast: &Contrast) -> Self {
        Self {
            subject: Some(subject.to_string()),
            session: session.map(str::to_string),
            contrast: Some(contrast.to_string()),
        }
    }

    pub fn group(contrast: &Contrast) -> Self {
        Self {
            subject: Some("average".to_string()),
            session: None,
            contrast: Some(contrast.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref s) = self.subject {
            parts.push(format!("sub-{}", s));
        }
        if let Some(ref s) = self.session {
            parts.push(format!("ses-{}", s));
        }
        if let Some(ref c) = self.contrast {
            parts.push(c.clone());
        }
        write!(f, "[{}]", parts.join(" "))
    }
}

/// Serde adapter storing a matrix as a list of rows
mod matrix_rows {
    use nalgebra::DMatrix;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(m: &DMatrix<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(m.nrows()))?;
        for r in 0..m.nrows() {
            let row: Vec<f64> = m.row(r).iter().copied().collect();
            seq.serialize_element(&row)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DMatrix<f64>, D::Error> {
        let rows: Vec<Vec<f64>> = Vec::deserialize(deserializer)?;
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(D::Error::custom("ragged epoch data: rows differ in length"));
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(DMatrix::from_row_slice(n_rows, n_cols, &flat))
    }
}
