pub mod aggregate;
pub mod artifact;
pub mod bootstrap;
pub mod classifier;
pub mod cluster;
pub mod config;
pub mod csp;
pub mod cv;
pub mod decoder;
pub mod error;
pub mod filters;
pub mod grid;
pub mod group;
pub mod labels;
pub mod lda;
pub mod linalg;
pub mod pca;
pub mod preprocess;
pub mod profiling;
pub mod report;
pub mod runner;
pub mod types;

pub use artifact::{ArtifactStore, ScoreArray, ScoreArtifact, ScoreKind};
pub use config::{DecodingConfig, PcaBasis, Regularization};
pub use decoder::decode_subject;
pub use error::{DecodingError, PartitionError, Result};
pub use grid::FrequencyTimeGrid;
pub use group::{group_analysis, GroupResult, TfStatistics};
pub use report::{LogReport, ReportSink};
pub use runner::{
    DecodingRunner, EpochSource, GroupFailure, JsonEpochSource, RunSummary, TaskRecord,
    TaskStatus,
};
pub use types::*;
