// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! External process execution
//!
//! git, cmake, ninja and dotnet are black boxes to the yard: a command either
//! succeeds or fails, and its output is kept for diagnostics.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A command line to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Start a command line for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What a finished process left behind
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code (None when terminated by a signal)
    pub code: Option<i32>,
    /// Wall-clock run time
    pub duration: Duration,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Something that can run a [`CommandSpec`] to completion
pub trait ProcessRunner {
    /// Run the command, capturing its output
    ///
    /// A non-zero exit is not an error at this level; use [`run_checked`].
    fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runs commands on the host with `std::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput> {
        debug!("Running: {}", cmd);

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let output = command.output().map_err(|source| Error::ToolUnavailable {
            program: cmd.program.clone(),
            source,
        })?;
        let duration = started.elapsed();

        trace!("{} finished in {:?} with {:?}", cmd.program, duration, output.status);

        Ok(ProcessOutput {
            code: output.status.code(),
            duration,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command and turn a non-zero exit into [`Error::ToolFailed`]
pub fn run_checked(runner: &dyn ProcessRunner, cmd: &CommandSpec) -> Result<ProcessOutput> {
    let output = runner.run(cmd)?;
    if output.success() {
        return Ok(output);
    }

    let stderr = output.stderr.trim();
    Err(Error::ToolFailed {
        program: cmd.program.clone(),
        code: output.code,
        stderr: if stderr.is_empty() {
            output.stdout.trim().to_string()
        } else {
            stderr.to_string()
        },
    })
}
