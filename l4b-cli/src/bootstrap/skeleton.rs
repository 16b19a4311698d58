//! Skeleton generator for the ~/.l4b state directory
//!
//! Tunnels keep their pidfiles and logs here, bootstrap reports land here.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectories of the state dir, by role
pub const TUNNELS_DIR: &str = "tunnels";
pub const LOGS_DIR: &str = "logs";
pub const REPORTS_DIR: &str = "reports";

const SKELETON: [&str; 3] = [TUNNELS_DIR, LOGS_DIR, REPORTS_DIR];

/// Result of skeleton generation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SkeletonResult {
    pub created: Vec<PathBuf>,
    pub already_existed: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
}

impl SkeletonResult {
    /// Check if all directories were successfully created or existed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Create a single directory; `Ok(true)` when newly created
fn create_directory(path: &Path) -> Result<bool> {
    if path.exists() {
        if path.is_dir() {
            Ok(false)
        } else {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        Ok(true)
    }
}

/// Create the state directory layout under `state_dir`
pub fn create_skeleton(state_dir: &Path) -> SkeletonResult {
    let mut result = SkeletonResult::default();

    for name in SKELETON {
        let path = state_dir.join(name);

        match create_directory(&path) {
            Ok(true) => result.created.push(path),
            Ok(false) => result.already_existed.push(path),
            Err(e) => result.errors.push((path, e.to_string())),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_skeleton_fresh_then_existing() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");

        let first = create_skeleton(&state);
        assert!(first.is_success());
        assert_eq!(first.created.len(), 3);
        assert!(state.join(TUNNELS_DIR).is_dir());

        let second = create_skeleton(&state);
        assert!(second.created.is_empty());
        assert_eq!(second.already_existed.len(), 3);
    }

    #[test]
    fn test_file_in_the_way_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOGS_DIR), "not a dir").unwrap();

        let result = create_skeleton(dir.path());
        assert!(!result.is_success());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].1.contains("not a directory"));
        assert_eq!(result.created.len(), 2);
    }
}
