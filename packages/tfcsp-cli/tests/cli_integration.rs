use assert_cmd::Command;
use predicates::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tfcsp() -> Command {
    Command::cargo_bin("tfcsp").unwrap()
}

/// 4 EEG channels at 100 Hz for 2 s; event 1 oscillates at 10 Hz on the
/// first channel, event 2 on the second
fn write_epochs(dir: &Path, subject: &str, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let channels: Vec<Value> = (0..4)
        .map(|i| json!({"name": format!("EEG{:03}", i + 1), "kind": "eeg"}))
        .collect();
    let epochs: Vec<Value> = (0..24)
        .map(|i| {
            let code = if i % 2 == 0 { 1 } else { 2 };
            let phase = rng.random_range(0.0..2.0 * PI);
            let data: Vec<Vec<f64>> = (0..4)
                .map(|ch| {
                    (0..200)
                        .map(|t| {
                            let noise = rng.random_range(-1.0..1.0);
                            if ch == code - 1 {
                                let time = t as f64 / 100.0;
                                noise + 3.0 * (2.0 * PI * 10.0 * time + phase).sin()
                            } else {
                                noise
                            }
                        })
                        .collect()
                })
                .collect();
            json!({"event_code": code, "data": data})
        })
        .collect();
    let set = json!({"sfreq": 100.0, "tmin": 0.0, "channels": channels, "epochs": epochs});
    fs::write(
        dir.join(format!("sub-{}_epo.json", subject)),
        serde_json::to_string(&set).unwrap(),
    )
    .unwrap();
}

fn write_config(dir: &Path, extra: Value) -> std::path::PathBuf {
    let mut config = json!({
        "decoding": {
            "csp_n_components": 2,
            "decoding_n_splits": 3,
            "n_boot": 100,
            "n_permutations": 50
        },
        "freqs": [8, 12, 30],
        "times": [0.0, 0.9, 1.8],
        "event_id": {"Famous/First": 1, "Scrambled/First": 2},
        "contrasts": [["Famous", "Scrambled"]]
    });
    if let (Some(base), Some(more)) = (config.as_object_mut(), extra.as_object()) {
        for (k, v) in more {
            base.insert(k.clone(), v.clone());
        }
    }
    let path = dir.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    tfcsp()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    tfcsp()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tfcsp"));
}

#[test]
fn test_help_lists_subcommands() {
    tfcsp()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("decode"))
        .stdout(predicate::str::contains("group"))
        .stdout(predicate::str::contains("validate"));
}

// =============================================================================
// VALIDATE / GRID
// =============================================================================

#[test]
fn test_validate_accepts_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({}));
    tfcsp()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid (1 contrast(s), 2 frequency x 2 time windows)"));
}

#[test]
fn test_validate_rejects_bad_parameters() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({"decoding": {"decoding_n_splits": 1}}));
    tfcsp()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("decoding_n_splits"));
}

#[test]
fn test_validate_json_reports_unknown_condition() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({"contrasts": [["Famous", "Unfamiliar"]]}));
    let out = tfcsp()
        .args(["validate", "--json", "--config"])
        .arg(&config)
        .assert()
        .code(2);
    let parsed = stdout_json(out.get_output());
    assert_eq!(parsed["valid"], false);
    assert!(parsed["error"].as_str().unwrap().contains("Unfamiliar"));
}

#[test]
fn test_validate_missing_config() {
    tfcsp()
        .args(["validate", "--config", "/nonexistent/config.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_grid_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({}));
    let out = tfcsp()
        .args(["grid", "--json", "--config"])
        .arg(&config)
        .assert()
        .success();
    let parsed = stdout_json(out.get_output());
    assert_eq!(parsed["centered_freqs"], json!([10.0, 21.0]));
    assert_eq!(parsed["time_windows"], json!([[0.0, 0.9], [0.9, 1.8]]));
}

#[test]
fn test_grid_rejects_unsorted_edges() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({"freqs": [12, 8]}));
    tfcsp()
        .args(["grid", "--config"])
        .arg(&config)
        .assert()
        .code(2);
}

// =============================================================================
// DECODE / GROUP
// =============================================================================

#[test]
fn test_decode_then_group() {
    let dir = TempDir::new().unwrap();
    let epochs_dir = dir.path().join("epochs");
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&epochs_dir).unwrap();
    write_epochs(&epochs_dir, "01", 1);
    write_epochs(&epochs_dir, "02", 2);
    let config = write_config(dir.path(), json!({}));

    let out = tfcsp()
        .args(["decode", "--jobs", "2", "--config"])
        .arg(&config)
        .arg("--epochs-dir")
        .arg(&epochs_dir)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success();
    let summary = stdout_json(out.get_output());
    assert_eq!(summary["skipped"], false);
    assert_eq!(summary["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(summary["group_failures"], json!([]));

    for kind in ["freq_scores", "freq_scores_std", "tf_scores"] {
        assert!(out_dir
            .join(format!("sub-01_contrast-Famous_vs_Scrambled_{}.json", kind))
            .is_file());
    }
    let group_path = out_dir.join("group_Famous_vs_Scrambled.json");
    let group: Value = serde_json::from_str(&fs::read_to_string(&group_path).unwrap()).unwrap();
    assert_eq!(group["n_complete"], 2);
    assert!(group["freq_stats"]["mean"][0].as_f64().unwrap() > 0.9);

    // Group analysis again, subjects discovered from the artifacts
    fs::remove_file(&group_path).unwrap();
    let out = tfcsp()
        .args(["group", "--config"])
        .arg(&config)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success();
    let results = stdout_json(out.get_output());
    assert_eq!(results[0]["contrast"], "Famous_vs_Scrambled");
    assert_eq!(results[0]["computed"], true);
    assert_eq!(results[0]["cluster_tested"], true);
    assert!(group_path.is_file());
}

#[test]
fn test_decode_partial_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    write_epochs(dir.path(), "01", 3);
    let config = write_config(dir.path(), json!({}));
    let out_dir = dir.path().join("out");

    let out = tfcsp()
        .args(["decode", "--subjects", "01", "02", "--config"])
        .arg(&config)
        .arg("--epochs-dir")
        .arg(dir.path())
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .code(3);
    let summary = stdout_json(out.get_output());
    let failed: Vec<&Value> = summary["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| t["status"] == "failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["subject"], "02");
    assert_eq!(summary["group_failures"], json!([]));

    // One complete tf map: frequency statistics only, no cluster test
    let group_path = out_dir.join("group_Famous_vs_Scrambled.json");
    let group: Value = serde_json::from_str(&fs::read_to_string(&group_path).unwrap()).unwrap();
    assert_eq!(group["n_complete"], 1);
    assert_eq!(group["tf_stats"], Value::Null);
    assert_eq!(group["significant"], false);
    assert_eq!(group["freq_stats"]["n"], 2);
}

#[test]
fn test_decode_all_failed_exit_code() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({"subjects": ["08", "09"]}));
    tfcsp()
        .args(["decode", "--config"])
        .arg(&config)
        .arg("--epochs-dir")
        .arg(dir.path())
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .code(4);
}

#[test]
fn test_decode_without_epochs_files() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), json!({}));
    tfcsp()
        .args(["decode", "--config"])
        .arg(&config)
        .arg("--epochs-dir")
        .arg(dir.path())
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No files matching"));
}

#[test]
fn test_decode_without_contrasts_is_skipped() {
    let dir = TempDir::new().unwrap();
    write_epochs(dir.path(), "01", 4);
    let config = write_config(dir.path(), json!({"contrasts": []}));
    let out = tfcsp()
        .args(["decode", "--compact", "--config"])
        .arg(&config)
        .arg("--epochs-dir")
        .arg(dir.path())
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .success();
    let summary = stdout_json(out.get_output());
    assert_eq!(summary["skipped"], true);
    assert!(summary["tasks"].as_array().unwrap().is_empty());
}
