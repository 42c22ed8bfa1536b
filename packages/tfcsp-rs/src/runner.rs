use crate::artifact::ArtifactStore;
use crate::config::DecodingConfig;
use crate::decoder::decode_subject;
use crate::error::{DecodingError, Result};
use crate::grid::FrequencyTimeGrid;
use crate::group::{group_analysis, GroupResult};
use crate::report::ReportSink;
use crate::types::{Contrast, EpochSet, LogContext};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Provider of the trials of one subject and session
pub trait EpochSource: Send + Sync {
    fn load(&self, subject: &str, session: Option<&str>) -> Result<EpochSet>;
}

/// Reads `sub-<s>[_ses-<x>]_epo.json` files from a directory
#[derive(Debug, Clone)]
pub struct JsonEpochSource {
    root: PathBuf,
}

impl JsonEpochSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, subject: &str, session: Option<&str>) -> PathBuf {
        let name = match session {
            Some(ses) => format!("sub-{}_ses-{}_epo.json", subject, ses),
            None => format!("sub-{}_epo.json", subject),
        };
        self.root.join(name)
    }
}

impl EpochSource for JsonEpochSource {
    fn load(&self, subject: &str, session: Option<&str>) -> Result<EpochSet> {
        let path = self.path(subject, session);
        if !path.exists() {
            return Err(DecodingError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(&path)?;
        let epochs: EpochSet = serde_json::from_str(&text)?;
        epochs.validate()?;
        Ok(epochs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

/// Outcome of one (subject, session, contrast) decoding task
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub subject: String,
    pub session: Option<String>,
    pub contrast: String,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub elapsed_secs: f64,
    pub artifacts: Vec<PathBuf>,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// No contrast was configured, nothing ran
    pub skipped: bool,
    pub tasks: Vec<TaskRecord>,
    /// Keys of the contrasts with at least one significant cluster
    pub significant_contrasts: Vec<String>,
    /// Contrasts whose group analysis returned an error
    pub group_failures: Vec<GroupFailure>,
    #[serde(skip)]
    pub groups: Vec<GroupResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFailure {
    pub contrast: String,
    pub error: String,
}

impl RunSummary {
    /// Empty summary stamped with the current time
    pub fn begin() -> Self {
        let started_at = Utc::now();
        Self {
            started_at,
            finished_at: started_at,
            skipped: false,
            tasks: Vec::new(),
            significant_contrasts: Vec::new(),
            group_failures: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn n_failed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count()
    }

    pub fn n_succeeded(&self) -> usize {
        self.tasks.len() - self.n_failed()
    }

    pub fn all_failed(&self) -> bool {
        !self.tasks.is_empty() && self.n_succeeded() == 0
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs every subject x session decoding task of each contrast on a worker
/// pool, then the group analysis of that contrast
pub struct DecodingRunner {
    pool: rayon::ThreadPool,
    config: DecodingConfig,
    grid: FrequencyTimeGrid,
    contrasts: Vec<Contrast>,
    store: ArtifactStore,
}

impl DecodingRunner {
    /// `n_jobs` of 0 uses one worker per logical CPU
    pub fn new(
        config: DecodingConfig,
        grid: FrequencyTimeGrid,
        contrasts: Vec<Contrast>,
        store: ArtifactStore,
        n_jobs: usize,
    ) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .thread_name(|i| format!("tfcsp-worker-{}", i))
            .build()
            .map_err(|e| DecodingError::InvalidParameter(format!("worker pool: {}", e)))?;
        Ok(Self {
            pool,
            config,
            grid,
            contrasts,
            store,
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Decode one task and persist its artifact
    fn run_task(
        &self,
        source: &dyn EpochSource,
        subject: &str,
        session: Option<&str>,
        contrast: &Contrast,
        report: &dyn ReportSink,
    ) -> TaskRecord {
        let ctx = LogContext::task(subject, session, contrast);
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<Vec<PathBuf>> {
            let epochs = source.load(subject, session)?;
            let artifact = decode_subject(
                &epochs,
                subject,
                session,
                contrast,
                &self.grid,
                &self.config,
                report,
            )?;
            self.store.save(&artifact)
        }))
        .unwrap_or_else(|payload| Err(DecodingError::Task(panic_message(payload))));

        let (status, error, artifacts) = match outcome {
            Ok(paths) => {
                log::info!("{} Decoding done", ctx);
                (TaskStatus::Succeeded, None, paths)
            }
            Err(e) => {
                log::error!("{} {}", ctx, e);
                (TaskStatus::Failed, Some(e.to_string()), Vec::new())
            }
        };
        TaskRecord {
            subject: subject.to_string(),
            session: session.map(str::to_string),
            contrast: contrast.to_string(),
            status,
            error,
            elapsed_secs: start.elapsed().as_secs_f64(),
            artifacts,
        }
    }

    /// Decode every subject x session for each contrast, then run its group
    /// analysis once all tasks of that contrast have finished.
    ///
    /// Task failures are recorded, not returned; a failing group analysis is
    /// logged and recorded in `group_failures`, and the next contrast
    /// proceeds.
    pub fn run(
        &self,
        source: &dyn EpochSource,
        subjects: &[String],
        sessions: &[Option<String>],
        report: &dyn ReportSink,
    ) -> RunSummary {
        let mut summary = RunSummary::begin();

        if self.contrasts.is_empty() {
            log::info!("contrasts was not specified. Skipping CSP decoding ...");
            summary.skipped = true;
            summary.finished_at = Utc::now();
            return summary;
        }

        let default_sessions = [None];
        let sessions = if sessions.is_empty() {
            &default_sessions[..]
        } else {
            sessions
        };
        let jobs: Vec<(&str, Option<&str>)> = subjects
            .iter()
            .flat_map(|sub| sessions.iter().map(move |ses| (sub.as_str(), ses.as_deref())))
            .collect();

        for contrast in &self.contrasts {
            log::info!(
                "Decoding {} on {} subject/session task(s) with {} worker(s)",
                contrast,
                jobs.len(),
                self.pool.current_num_threads()
            );
            let records: Vec<TaskRecord> = self.pool.install(|| {
                jobs.par_iter()
                    .map(|&(sub, ses)| self.run_task(source, sub, ses, contrast, report))
                    .collect()
            });
            summary.tasks.extend(records);

            match group_analysis(
                &self.store,
                subjects,
                sessions,
                contrast,
                &self.grid,
                &self.config,
                report,
            ) {
                Ok(Some(result)) => {
                    if result.significant {
                        summary.significant_contrasts.push(contrast.key());
                    }
                    summary.groups.push(result);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("{} Group analysis failed: {}", LogContext::group(contrast), e);
                    summary.group_failures.push(GroupFailure {
                        contrast: contrast.key(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary.finished_at = Utc::now();
        log::info!(
            "Completed time-frequency decoding: {} task(s) succeeded, {} failed",
            summary.n_succeeded(),
            summary.n_failed()
        );
        summary
    }
}
