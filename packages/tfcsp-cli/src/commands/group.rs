use crate::cli::GroupArgs;
use crate::commands::decode::write_group;
use crate::discovery::{resolve_subjects, ARTIFACT_PATTERN};
use crate::exit_codes;
use crate::output;
use crate::run_config::RunConfig;
use serde::Serialize;
use tfcsp_rs::{group_analysis, ArtifactStore, LogReport};

#[derive(Serialize)]
struct GroupOutput {
    contrast: String,
    /// False when too few subjects were available
    computed: bool,
    /// False when fewer than two complete tf maps allowed no cluster test
    cluster_tested: bool,
    n_complete: usize,
    significant: bool,
    min_cluster_p: Option<f64>,
}

pub fn execute(args: GroupArgs) -> i32 {
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
    if contrasts.is_empty() {
        log::info!("contrasts was not specified. Skipping group analysis ...");
        return exit_codes::SUCCESS;
    }

    let subjects = match resolve_subjects(
        args.subjects.as_deref(),
        &config.subjects,
        &args.output_dir,
        ARTIFACT_PATTERN,
    ) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };
    let sessions = config.sessions(args.sessions.as_deref());
    let store = ArtifactStore::new(&args.output_dir);

    let mut results = Vec::with_capacity(contrasts.len());
    for contrast in &contrasts {
        let outcome = group_analysis(
            &store,
            &subjects,
            &sessions,
            contrast,
            &grid,
            &config.decoding,
            &LogReport,
        );
        match outcome {
            Ok(Some(group)) => {
                if !write_group(&group, &args.output_dir) {
                    return exit_codes::EXECUTION_ERROR;
                }
                results.push(GroupOutput {
                    contrast: contrast.key(),
                    computed: true,
                    cluster_tested: group.tf_stats.is_some(),
                    n_complete: group.n_complete,
                    significant: group.significant,
                    min_cluster_p: group
                        .tf_stats
                        .as_ref()
                        .and_then(|s| s.cluster.min_p_value()),
                });
            }
            Ok(None) => results.push(GroupOutput {
                contrast: contrast.key(),
                computed: false,
                cluster_tested: false,
                n_complete: 0,
                significant: false,
                min_cluster_p: None,
            }),
            Err(e) => {
                eprintln!("Error: group analysis of {} failed: {}", contrast, e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    }

    if output::emit(&results, args.compact, None) {
        exit_codes::SUCCESS
    } else {
        exit_codes::EXECUTION_ERROR
    }
}
