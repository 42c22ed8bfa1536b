use thiserror::Error;

/// Why a contrast does not partition the trials it is applied to
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("event code {code} is contained both in {first}'s set {first_codes:?} and in {second}'s set {second_codes:?}; the contrast is not a valid partition")]
    Overlap {
        code: i32,
        first: String,
        first_codes: Vec<i32>,
        second: String,
        second_codes: Vec<i32>,
    },

    #[error("event code {code} is contained neither in {first}'s set {first_codes:?} nor in {second}'s set {second_codes:?}")]
    Unmatched {
        code: i32,
        first: String,
        first_codes: Vec<i32>,
        second: String,
        second_codes: Vec<i32>,
    },
}

#[derive(Error, Debug)]
pub enum DecodingError {
    #[error("Invalid contrast partition: {0}")]
    Partition(#[from] PartitionError),

    #[error("Time window [{tmin}, {tmax}] s is outside the epoch time extent [{epoch_tmin}, {epoch_tmax}] s")]
    GridBounds {
        tmin: f64,
        tmax: f64,
        epoch_tmin: f64,
        epoch_tmax: f64,
    },

    #[error("Epochs file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Score artifact not found: {0}")]
    MissingArtifact(String),

    #[error("Shape mismatch for {path}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        path: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Group analysis needs at least 2 subjects/sessions, got {0}")]
    InsufficientSubjects(usize),

    #[error("Stratified split failed: {0}")]
    Stratification(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecodingError>;
