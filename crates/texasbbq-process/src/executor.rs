//! Command description, captured output and the system executor.

use crate::error::{ProcessError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (looked up on `PATH` unless absolute).
    pub program: String,

    /// Arguments, passed through verbatim.
    pub args: Vec<String>,

    /// Working directory for the child.
    pub cwd: Option<PathBuf>,

    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Create a command that hands `command` to `sh -c`.
    pub fn shell(command: &str) -> Self {
        Self::new("sh").arg("-c").arg(command)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program and arguments as a single printable line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}

/// Result of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command line that was run.
    pub command: String,

    /// Exit code (0 = success, -1 = killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the child exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, for error reports.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Turn a nonzero exit into [`ProcessError::CommandFailed`].
    pub fn into_checked(self) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProcessError::CommandFailed {
                output: self.combined(),
                command: self.command,
                exit_code: self.exit_code,
            })
        }
    }
}

/// Runs commands to completion.
///
/// Implementations must block until the child has exited. Callers rely on
/// this: conda environments beneath one installation root are never
/// touched by two children at once.
pub trait ProcessExecutor {
    /// Run `spec` and return its output regardless of exit status.
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run `spec` and fail with [`ProcessError::CommandFailed`] on a nonzero exit.
    fn check(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.execute(spec)?.into_checked()
    }
}

impl<E: ProcessExecutor + ?Sized> ProcessExecutor for &E {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        (**self).execute(spec)
    }
}

/// Executor backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if spec.program.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        let command = spec.command_line();
        info!("running: '{}'", command);

        let start = Instant::now();
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!(exit_code, duration_ms, "finished: '{}'", command);

        Ok(CommandOutput {
            command,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }
}
