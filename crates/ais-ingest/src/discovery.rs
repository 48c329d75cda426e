//! Input file discovery
//!
//! Lists the candidate `*.json` files of the input directory and partitions
//! them against the ledger's set of processed paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};

/// Extension of position report files
pub const DATA_FILE_EXTENSION: &str = "json";

/// Candidates split by ledger membership, each half in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Not yet in the ledger; the backlog for this run
    pub new_files: Vec<PathBuf>,
    /// Already marked processed by an earlier run but still on disk
    pub previously_processed: Vec<PathBuf>,
}

/// List data files in `input_dir` as absolute paths, sorted by name
///
/// A listing failure is fatal. A file whose type cannot be determined is
/// logged and left out.
pub async fn discover(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = std::path::absolute(input_dir).map_err(|source| IngestError::Discovery {
        path: input_dir.to_path_buf(),
        source,
    })?;

    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(|source| IngestError::Discovery {
            path: dir.clone(),
            source,
        })?;

    let mut total = 0usize;
    let mut candidates = Vec::new();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                return Err(IngestError::Discovery {
                    path: dir.clone(),
                    source,
                })
            },
        };
        total += 1;

        let path = dir.join(entry.file_name());
        if !has_data_extension(&path) {
            continue;
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                debug!(path = %path.display(), "Skipping directory with data extension");
            },
            Ok(_) => candidates.push(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat file, excluding it");
            },
        }
    }

    candidates.sort();

    info!(
        dir = %dir.display(),
        entries = total,
        data_files = candidates.len(),
        "Scanned input directory"
    );

    Ok(candidates)
}

/// Split `candidates` into new and already-processed paths
///
/// Membership is exact string equality against the ledger paths. Duplicate
/// candidates are reported once.
pub fn diff(candidates: &[PathBuf], already_processed: &HashSet<String>) -> Partition {
    let mut seen = HashSet::new();
    let mut partition = Partition::default();

    for path in candidates {
        let key = path.to_string_lossy();
        if !seen.insert(key.to_string()) {
            continue;
        }
        if already_processed.contains(key.as_ref()) {
            partition.previously_processed.push(path.clone());
        } else {
            partition.new_files.push(path.clone());
        }
    }

    info!(
        new = partition.new_files.len(),
        previously_processed = partition.previously_processed.len(),
        "Compared input files against ledger"
    );

    partition
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == DATA_FILE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/data/{n}"))).collect()
    }

    fn ledger(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| format!("/data/{n}")).collect()
    }

    #[test]
    fn test_diff_preserves_order() {
        let candidates = paths(&["c.json", "a.json", "b.json"]);
        let partition = diff(&candidates, &ledger(&["a.json"]));

        assert_eq!(partition.new_files, paths(&["c.json", "b.json"]));
        assert_eq!(partition.previously_processed, paths(&["a.json"]));
    }

    #[test]
    fn test_diff_requires_exact_path_match() {
        let candidates = paths(&["a.json"]);
        let mut known = HashSet::new();
        known.insert("data/a.json".to_string());

        let partition = diff(&candidates, &known);
        assert_eq!(partition.new_files.len(), 1);
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_data_extension(Path::new("/data/20210101_000000.json")));
        assert!(!has_data_extension(Path::new("/data/20210101_000000.json.gz")));
        assert!(!has_data_extension(Path::new("/data/notes.txt")));
        assert!(!has_data_extension(Path::new("/data/json")));
    }

    #[tokio::test]
    async fn test_discover_filters_directories_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20210101_000000.json"), "{}").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let found = discover(dir.path()).await.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].is_absolute());
        assert!(found[0].ends_with("20210101_000000.json"));
    }

    #[tokio::test]
    async fn test_discover_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, IngestError::Discovery { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_discover_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["20210101_000000.json", "20210101_000100.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let known = HashSet::new();

        let first = diff(&discover(dir.path()).await.unwrap(), &known);
        let second = diff(&discover(dir.path()).await.unwrap(), &known);
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_diff_is_set_difference(
            candidates in proptest::collection::vec("[a-e]{1,2}", 0..20),
            known in proptest::collection::hash_set("[a-e]{1,2}", 0..10),
        ) {
            let candidates: Vec<PathBuf> = candidates.iter().map(PathBuf::from).collect();
            let partition = diff(&candidates, &known);

            let all: HashSet<String> =
                candidates.iter().map(|p| p.to_string_lossy().to_string()).collect();
            let new: HashSet<String> =
                partition.new_files.iter().map(|p| p.to_string_lossy().to_string()).collect();
            let old: HashSet<String> = partition
                .previously_processed
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();

            // A \ B, without duplicates
            prop_assert_eq!(new.len(), partition.new_files.len());
            let expected_new: HashSet<String> = all.difference(&known).cloned().collect();
            prop_assert_eq!(&new, &expected_new);

            // A \ (A \ B) == A ∩ B
            let expected_old: HashSet<String> = all.intersection(&known).cloned().collect();
            let complement: HashSet<String> = all.difference(&new).cloned().collect();
            prop_assert_eq!(&old, &expected_old);
            prop_assert_eq!(&complement, &expected_old);
        }
    }
}
