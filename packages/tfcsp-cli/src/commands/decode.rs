use crate::cli::DecodeArgs;
use crate::discovery::{resolve_subjects, EPOCHS_PATTERN};
use crate::exit_codes;
use crate::output;
use crate::run_config::RunConfig;
use std::path::Path;
use tfcsp_rs::{ArtifactStore, DecodingRunner, GroupResult, JsonEpochSource, LogReport, RunSummary};

pub fn execute(args: DecodeArgs) -> i32 {
    let config = match RunConfig::load(&args.config) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let (grid, contrasts) = match config.grid().and_then(|g| Ok((g, config.contrasts()?))) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let subjects = match resolve_subjects(
        args.subjects.as_deref(),
        &config.subjects,
        &args.epochs_dir,
        EPOCHS_PATTERN,
    ) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let sessions = config.sessions(args.sessions.as_deref());

    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        eprintln!(
            "Error: Failed to create output directory '{}': {}",
            args.output_dir.display(),
            e
        );
        return exit_codes::EXECUTION_ERROR;
    }

    let runner = match DecodingRunner::new(
        config.decoding.clone(),
        grid,
        contrasts,
        ArtifactStore::new(&args.output_dir),
        args.jobs,
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let source = JsonEpochSource::new(&args.epochs_dir);
    let summary = runner.run(&source, &subjects, &sessions, &LogReport);

    for group in &summary.groups {
        if !write_group(group, &args.output_dir) {
            return exit_codes::EXECUTION_ERROR;
        }
    }
    if !output::emit(&summary, args.compact, args.output.as_deref()) {
        return exit_codes::EXECUTION_ERROR;
    }

    eprintln!(
        "Decoding complete: {}/{} task(s) succeeded, {} significant contrast(s)",
        summary.n_succeeded(),
        summary.tasks.len(),
        summary.significant_contrasts.len()
    );
    exit_code(&summary)
}

/// Persist one contrast's group result as `group_<contrast>.json`
pub fn write_group(group: &GroupResult, dir: &Path) -> bool {
    let path = dir.join(format!("group_{}.json", group.contrast.key()));
    let written = output::emit(group, false, Some(&path));
    if written {
        log::info!("Group results written to {}", path.display());
    }
    written
}

fn exit_code(summary: &RunSummary) -> i32 {
    if summary.all_failed() {
        exit_codes::ALL_FAILED
    } else if !summary.group_failures.is_empty() {
        exit_codes::EXECUTION_ERROR
    } else if summary.n_failed() > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfcsp_rs::{GroupFailure, TaskRecord, TaskStatus};

    fn task(subject: &str, status: TaskStatus) -> TaskRecord {
        TaskRecord {
            subject: subject.to_string(),
            session: None,
            contrast: "a – b".to_string(),
            status,
            error: None,
            elapsed_secs: 0.0,
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_exit_code_from_tasks() {
        let mut summary = RunSummary::begin();
        assert_eq!(exit_code(&summary), exit_codes::SUCCESS);
        summary.tasks.push(task("01", TaskStatus::Succeeded));
        summary.tasks.push(task("02", TaskStatus::Failed));
        assert_eq!(exit_code(&summary), exit_codes::PARTIAL_FAILURE);
        summary.tasks.remove(0);
        assert_eq!(exit_code(&summary), exit_codes::ALL_FAILED);
    }

    #[test]
    fn test_failed_group_analysis_is_an_execution_error() {
        let mut summary = RunSummary::begin();
        summary.tasks.push(task("01", TaskStatus::Succeeded));
        summary.tasks.push(task("02", TaskStatus::Succeeded));
        summary.group_failures.push(GroupFailure {
            contrast: "a_vs_b".to_string(),
            error: "Numerical error: singular".to_string(),
        });
        assert_eq!(exit_code(&summary), exit_codes::EXECUTION_ERROR);

        summary.tasks.push(task("03", TaskStatus::Failed));
        assert_eq!(exit_code(&summary), exit_codes::EXECUTION_ERROR);
    }
}
