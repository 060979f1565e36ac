//! External command execution utilities.
//!
//! Provides a Builder-based API for running the container tooling with its
//! output mirrored to the operator's console.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Run to completion, mirroring stdout while capturing it
//! let output = Cmd::new("docker").args(["build", "."]).run_mirrored()?;
//!
//! // Start a long-lived process with inherited stdio
//! let child = Cmd::new("docker").args(["run", "-p", "49152:80", "abc123"]).spawn()?;
//! ```

use anyhow::{Context, Result};
use std::{
    ffi::{OsStr, OsString},
    io::{BufRead, BufReader, Write},
    process::{Child, Command, Output, Stdio},
};

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Get the program name for error messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Arguments collected so far.
    #[cfg(test)]
    pub fn get_args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Run to completion. Stdout is echoed line by line to the console while
    /// being captured; stderr goes straight to the console.
    ///
    /// A non-zero exit is not an error here; inspect `Output::status`.
    pub fn run_mirrored(self) -> Result<Output> {
        let name = self.program_name();
        let mut child = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        let mut captured = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            mirror_lines(BufReader::new(stdout), &mut captured)
                .with_context(|| format!("Failed to read output of `{name}`"))?;
        }

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for `{name}`"))?;

        Ok(Output {
            status,
            stdout: captured,
            stderr: Vec::new(),
        })
    }

    /// Start the process with inherited stdio and return without waiting.
    pub fn spawn(self) -> Result<Child> {
        let name = self.program_name();
        self.command()
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))
    }
}

/// Copy `reader` to stdout line by line, keeping a copy of every byte.
fn mirror_lines<R: BufRead>(mut reader: R, captured: &mut Vec<u8>) -> std::io::Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        crate::logger::release_status();
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&line)?;
        stdout.flush()?;
        captured.extend_from_slice(&line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::new("docker")
            .arg("build")
            .args([".", "--pull"]);

        assert_eq!(cmd.program, OsString::from("docker"));
        assert_eq!(cmd.args.len(), 3);
    }

    #[test]
    fn test_empty_args_filtered() {
        let cmd = Cmd::new("echo").arg("").args(["a", "", "b"]);
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn test_mirror_lines_keeps_everything() {
        let input = b"Step 1/2\nSuccessfully built abc123\nno newline".as_slice();
        let mut captured = Vec::new();
        mirror_lines(input, &mut captured).unwrap();
        assert_eq!(captured, input);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_mirrored_captures_stdout() {
        let output = Cmd::new("echo").arg("hello").run_mirrored().unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_mirrored_reports_failure_status() {
        let output = Cmd::new("sh")
            .args(["-c", "echo partial; exit 3"])
            .run_mirrored()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "partial\n");
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let err = Cmd::new("definitely-not-a-real-program-4f1c").spawn().unwrap_err();
        assert!(format!("{err:#}").contains("definitely-not-a-real-program-4f1c"));
    }
}
