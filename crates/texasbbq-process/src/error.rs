//! Error types for texasbbq-process

use thiserror::Error;

/// Errors that can occur while running a subprocess
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The command has no program to run
    #[error("command is empty")]
    EmptyCommand,

    /// The program could not be started at all
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited with a nonzero status
    #[error("command '{command}' exited with code {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },
}

impl ProcessError {
    /// Exit code of the child, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Output captured from the child (empty when it never started).
    pub fn captured_output(&self) -> &str {
        match self {
            ProcessError::CommandFailed { output, .. } => output,
            _ => "",
        }
    }
}

/// Result type for subprocess operations
pub type Result<T> = std::result::Result<T, ProcessError>;
