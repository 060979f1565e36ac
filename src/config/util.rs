//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from `start`
///
/// Walks up parent directories until finding `config_name`.
///
/// # Example
/// ```text
/// /home/user/app/src/handlers/  ← cwd
/// /home/user/app/reload.toml    ← found!
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Resolve `path` against `base` unless it is already absolute.
///
/// Interior `.` components are dropped, so `/app` + `./src` gives `/app/src`.
pub fn resolve_under(base: &Path, path: &Path) -> PathBuf {
    base.join(path).components().collect()
}

// ============================================================================
// tests
// ============================================================================
