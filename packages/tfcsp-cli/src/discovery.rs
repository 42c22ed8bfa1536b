use std::collections::BTreeSet;
use std::path::Path;

/// Epochs files read by the decoder
pub const EPOCHS_PATTERN: &str = "sub-*_epo.json";
/// Score artifacts written by the decoder, one per subject x session
pub const ARTIFACT_PATTERN: &str = "sub-*_contrast-*_freq_scores.json";

/// Subject label of a `sub-<id>[_...]` file name
fn subject_of(file_name: &str) -> Option<String> {
    let rest = file_name.strip_prefix("sub-")?;
    let id = rest.split('_').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Sorted, de-duplicated subjects of the files in `dir` matching `pattern`
pub fn discover_subjects(dir: &Path, pattern: &str) -> Result<Vec<String>, String> {
    if !dir.is_dir() {
        return Err(format!("Directory not found: {}", dir.display()));
    }
    let full = dir.join(pattern);
    let full = full
        .to_str()
        .ok_or_else(|| format!("Non UTF-8 path: {}", dir.display()))?;
    let paths =
        glob::glob(full).map_err(|e| format!("Invalid glob pattern '{}': {}", full, e))?;

    let mut subjects = BTreeSet::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }
                if let Some(sub) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(subject_of)
                {
                    subjects.insert(sub);
                }
            }
            Err(e) => log::warn!("glob error: {}", e),
        }
    }
    Ok(subjects.into_iter().collect())
}

/// Command line first, then the configuration, then whatever `dir` holds
pub fn resolve_subjects(
    cli: Option<&[String]>,
    configured: &[String],
    dir: &Path,
    pattern: &str,
) -> Result<Vec<String>, String> {
    if let Some(subjects) = cli {
        return Ok(subjects.to_vec());
    }
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    let found = discover_subjects(dir, pattern)?;
    if found.is_empty() {
        return Err(format!(
            "No files matching '{}' found in {}",
            pattern,
            dir.display()
        ));
    }
    log::info!("Discovered {} subject(s) in {}", found.len(), dir.display());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_subject_of() {
        assert_eq!(subject_of("sub-01_epo.json").as_deref(), Some("01"));
        assert_eq!(subject_of("sub-02_ses-meg_epo.json").as_deref(), Some("02"));
        assert_eq!(subject_of("sub-_epo.json"), None);
        assert_eq!(subject_of("group_a_vs_b.json"), None);
    }

    #[test]
    fn test_discover_epochs_files() {
        let dir = TempDir::new().unwrap();
        for name in [
            "sub-02_epo.json",
            "sub-01_ses-a_epo.json",
            "sub-01_ses-b_epo.json",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let found = discover_subjects(dir.path(), EPOCHS_PATTERN).unwrap();
        assert_eq!(found, vec!["01", "02"]);
    }

    #[test]
    fn test_discover_artifacts() {
        let dir = TempDir::new().unwrap();
        for name in [
            "sub-07_contrast-a_vs_b_freq_scores.json",
            "sub-07_contrast-a_vs_b_tf_scores.json",
            "group_a_vs_b.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let found = discover_subjects(dir.path(), ARTIFACT_PATTERN).unwrap();
        assert_eq!(found, vec!["07"]);
    }

    #[test]
    fn test_resolution_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sub-09_epo.json"), "{}").unwrap();
        let cli = vec!["01".to_string()];
        let configured = vec!["02".to_string()];

        let from_cli =
            resolve_subjects(Some(cli.as_slice()), &configured, dir.path(), EPOCHS_PATTERN);
        assert_eq!(from_cli.unwrap(), vec!["01"]);
        let from_config = resolve_subjects(None, &configured, dir.path(), EPOCHS_PATTERN);
        assert_eq!(from_config.unwrap(), vec!["02"]);
        let found = resolve_subjects(None, &[], dir.path(), EPOCHS_PATTERN);
        assert_eq!(found.unwrap(), vec!["09"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve_subjects(None, &[], dir.path(), EPOCHS_PATTERN).unwrap_err();
        assert!(err.contains("No files matching"));
        assert!(discover_subjects(&dir.path().join("missing"), EPOCHS_PATTERN).is_err());
    }
}
