//! Container build/run collaborators.
//!
//! The orchestrator only talks to [`ContainerRuntime`]; [`DockerRuntime`]
//! shells out to the `docker` CLI (or any CLI with the same `build`/`run`
//! surface, e.g. `podman`).

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};

use thiserror::Error;

use super::image::ImageId;
use crate::utils::exec::Cmd;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("`{program}` not found in PATH")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error(transparent)]
    Exec(#[from] anyhow::Error),

    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("failed to signal process {pid}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for process {pid}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Captured standard output of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub stdout: String,
}

/// Everything needed to start one backend container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: ImageId,
    pub host_port: u16,
    pub container_port: u16,
    pub env_file: Option<PathBuf>,
}

impl RunSpec {
    /// The `-p` value: `<ephemeral>:<container>`.
    pub fn publish_arg(&self) -> String {
        format!("{}:{}", self.host_port, self.container_port)
    }
}

/// A started backend process.
pub trait ProcessHandle: Send {
    fn id(&self) -> u32;

    /// Ask the process to exit gracefully. Does not wait.
    fn terminate(&mut self) -> Result<(), RuntimeError>;

    /// Block until the process has exited.
    fn wait(&mut self) -> Result<(), RuntimeError>;
}

/// Build and run collaborators.
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from `context`. Output is mirrored to the console while
    /// being captured. A non-zero exit is an error.
    fn build(&self, context: &Path) -> Result<BuildOutput, RuntimeError>;

    /// Start a long-lived container from `spec` and return without waiting.
    fn run(&self, spec: &RunSpec) -> Result<Box<dyn ProcessHandle>, RuntimeError>;
}

// ============================================================================
// Docker CLI
// ============================================================================

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: PathBuf,
    build_args: Vec<String>,
    run_args: Vec<String>,
}

impl DockerRuntime {
    /// Resolve `program` in `PATH`.
    pub fn new(
        program: &str,
        build_args: Vec<String>,
        run_args: Vec<String>,
    ) -> Result<Self, RuntimeError> {
        let program = which::which(program).map_err(|source| RuntimeError::NotFound {
            program: program.to_string(),
            source,
        })?;
        Ok(Self {
            program,
            build_args,
            run_args,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn build_cmd(&self, context: &Path) -> Cmd {
        Cmd::new(&self.program)
            .arg("build")
            .args(&self.build_args)
            .arg(context)
    }

    fn run_cmd(&self, spec: &RunSpec) -> Cmd {
        let mut cmd = Cmd::new(&self.program)
            .arg("run")
            .args(&self.run_args)
            .args(["-p", &spec.publish_arg()]);
        if let Some(env_file) = &spec.env_file {
            cmd = cmd.arg("--env-file").arg(env_file);
        }
        cmd.arg(spec.image.as_str())
    }
}

impl ContainerRuntime for DockerRuntime {
    fn build(&self, context: &Path) -> Result<BuildOutput, RuntimeError> {
        let output = self.build_cmd(context).run_mirrored()?;
        if !output.status.success() {
            return Err(RuntimeError::Failed {
                program: self.program.display().to_string(),
                status: output.status,
            });
        }
        Ok(BuildOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    fn run(&self, spec: &RunSpec) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        let child = self.run_cmd(spec).spawn()?;
        Ok(Box::new(ChildProcess::new(child)))
    }
}

/// [`ProcessHandle`] over a spawned child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl ProcessHandle for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn terminate(&mut self) -> Result<(), RuntimeError> {
        let pid = self.id();
        // Already exited: nothing to signal.
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }
        send_sigterm(&mut self.child).map_err(|source| RuntimeError::Signal { pid, source })
    }

    fn wait(&mut self) -> Result<(), RuntimeError> {
        let pid = self.id();
        self.child
            .wait()
            .map(|_| ())
            .map_err(|source| RuntimeError::Wait { pid, source })
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: kill(2) with a pid we spawned and have not reaped yet.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) -> io::Result<()> {
    child.kill()
}
