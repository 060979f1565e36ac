//! `[watch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [watch]
//! root = "."            # Directory tree to watch
//! debounce_ms = 1000    # Quiet period before a rebuild; 0 disables
//! ignore = ["target"]   # Path segments whose changes are ignored
//! ```
//!
//! Hidden files and `.git`/`.hg`/`.svn` contents are always ignored.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Watched directory (relative to the config file's directory).
    pub root: PathBuf,

    /// Debounce interval in milliseconds.
    pub debounce_ms: u64,

    /// Ignored path segments, matched against whole components.
    pub ignore: Vec<String>,
}

impl WatchConfig {
    pub const ROOT: FieldPath = FieldPath::new("watch.root");
    pub const IGNORE: FieldPath = FieldPath::new("watch.ignore");

    /// `None` when debouncing is disabled.
    pub fn debounce(&self) -> Option<Duration> {
        (self.debounce_ms > 0).then(|| Duration::from_millis(self.debounce_ms))
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.root.is_dir() {
            diag.error(
                Self::ROOT,
                format!("`{}` is not a directory", self.root.display()),
            );
        }
        for segment in &self.ignore {
            if segment.is_empty() || segment.contains(['/', '\\']) {
                diag.error_with_hint(
                    Self::IGNORE,
                    format!("invalid segment `{segment}`"),
                    "use single path components such as \"target\" or \"node_modules\"",
                );
            }
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            debounce_ms: 1000,
            ignore: Vec::new(),
        }
    }
}
