//! Architectural Enforcement Integration Tests
//!
//! This package holds workspace-wide checks that scan the mealagent source
//! trees rather than exercising them:
//! - No blocking filesystem, network, process or HTTP I/O in async code
//!
//! The checks live under `tests/`; this library only provides the source
//! roots they scan.

use std::path::PathBuf;

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Production source directories subject to the checks
#[must_use]
pub fn production_source_dirs() -> Vec<PathBuf> {
    let root = workspace_root();
    vec![
        root.join("mealagent").join("core").join("src"),
        root.join("mealagent").join("cli").join("src"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_dirs_exist() {
        for dir in production_source_dirs() {
            assert!(dir.is_dir(), "missing source dir: {}", dir.display());
        }
    }
}
