//! `[backend]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [backend]
//! program = "docker"          # Container CLI (`podman` works too)
//! context = "."               # Build context
//! publish = "8080:80"         # HOST:CONTAINER, or pass -p
//! env_file = ".env"           # Passed as --env-file to every run
//! build_args = ["--pull"]     # Extra `build` arguments
//! run_args = ["--rm"]         # Extra `run` arguments
//! shutdown_timeout_ms = 5000  # Wait for backends on exit
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::PortBinding;
use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub program: String,
    pub context: PathBuf,
    pub publish: Option<PortBinding>,
    pub env_file: Option<PathBuf>,
    pub build_args: Vec<String>,
    pub run_args: Vec<String>,
    pub shutdown_timeout_ms: u64,
}

impl BackendConfig {
    pub const PROGRAM: FieldPath = FieldPath::new("backend.program");
    pub const CONTEXT: FieldPath = FieldPath::new("backend.context");
    pub const PUBLISH: FieldPath = FieldPath::new("backend.publish");
    pub const ENV_FILE: FieldPath = FieldPath::new("backend.env_file");

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.publish.is_none() {
            diag.error_with_hint(
                Self::PUBLISH,
                "no port binding given",
                "pass -p HOST:CONTAINER or set `publish = \"8080:80\"`",
            );
        }

        if let Err(e) = which::which(&self.program) {
            diag.error_with_hint(
                Self::PROGRAM,
                format!("`{}` not found: {e}", self.program),
                "install docker or point `program` at a compatible CLI",
            );
        }

        if !self.context.is_dir() {
            diag.error(
                Self::CONTEXT,
                format!("`{}` is not a directory", self.context.display()),
            );
        }

        if let Some(env_file) = &self.env_file
            && !env_file.is_file()
        {
            diag.error(
                Self::ENV_FILE,
                format!("`{}` does not exist", env_file.display()),
            );
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            context: PathBuf::from("."),
            publish: None,
            env_file: None,
            build_args: Vec::new(),
            run_args: vec!["--rm".to_string()],
            shutdown_timeout_ms: 5000,
        }
    }
}
