//! Configuration management for `reload.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── backend    # [backend]
//! │   ├── serve      # [serve]
//! │   └── watch      # [watch]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # ReloadConfig (this file)
//! ```
//!
//! The file is optional: without one every section takes its defaults and
//! the port binding must come from `-p`. Relative paths in the file are
//! resolved against the file's directory; relative paths on the command line
//! against the working directory. Command-line values win.

pub mod section;
pub mod types;
mod util;

use util::{find_config_file, resolve_under};

pub use section::{BackendConfig, ServeConfig, WatchConfig};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};

use crate::{backend::PortBinding, cli::Cli};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing reload.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Absolute path to the config file, if one was found
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative config paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,

    /// Proxy front settings
    pub serve: ServeConfig,

    /// Watched tree settings
    pub watch: WatchConfig,

    /// Container build/run settings
    pub backend: BackendConfig,
}

impl ReloadConfig {
    /// Load configuration from CLI arguments.
    ///
    /// With `-C`, the file must exist. Otherwise `reload.toml` is searched
    /// upward from the working directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config = Self::load_from(cli, &cwd)?;
        config.validate()?;
        Ok(config)
    }

    /// Everything `load` does except validation.
    fn load_from(cli: &Cli, cwd: &Path) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => {
                let path = resolve_under(cwd, path);
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => find_config_file(cwd, Path::new(Cli::CONFIG_NAME)),
        };

        let mut config = match &config_path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        let root = config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(cwd)
            .to_path_buf();
        config.normalize_paths(&root);
        config.apply_cli(cli, cwd);
        config.config_path = config_path;
        config.root = root;
        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path, rejecting unknown fields.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            return Err(ConfigError::UnknownFields(path.to_path_buf(), ignored).into());
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Port binding; present once validation has passed.
    pub fn publish(&self) -> Option<PortBinding> {
        self.backend.publish
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-line overrides.
    fn apply_cli(&mut self, cli: &Cli, cwd: &Path) {
        crate::logger::set_verbose(cli.verbose);

        if let Some(publish) = cli.publish {
            self.backend.publish = Some(publish);
        }
        if let Some(env_file) = &cli.env_file {
            self.backend.env_file = Some(resolve_under(cwd, env_file));
        }
        if let Some(root) = &cli.watch {
            self.watch.root = resolve_under(cwd, root);
        }
        Self::update_option(&mut self.watch.debounce_ms, cli.debounce.as_ref());
        Self::update_option(&mut self.serve.interface, cli.interface.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Resolve file-relative paths against `root`.
    fn normalize_paths(&mut self, root: &Path) {
        self.watch.root = resolve_under(root, &self.watch.root);
        self.backend.context = resolve_under(root, &self.backend.context);
        if let Some(env_file) = self.backend.env_file.take() {
            self.backend.env_file = Some(resolve_under(root, &env_file));
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.serve.validate(&mut diag);
        self.watch.validate(&mut diag);
        self.backend.validate(&mut diag);

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ReloadConfig {
    let (parsed, ignored) = ReloadConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
