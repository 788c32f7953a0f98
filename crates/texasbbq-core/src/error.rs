//! Error taxonomy for texasbbq.
//!
//! Two families: [`RunError`] aborts a whole run, everything else is a
//! [`TargetError`] that is recorded against one target while the run
//! carries on with the next.

use conda_env_manager::{BootstrapError, CondaError};
use std::path::PathBuf;
use texasbbq_process::ProcessError;

/// Errors while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("project '{project}': {reason}")]
    Invalid { project: String, reason: String },
}

/// Errors obtaining a project's sources.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("cannot list tags of {url}: {source}")]
    ListTags {
        url: String,
        #[source]
        source: ProcessError,
    },

    #[error("no release tag of {url} matches the ref policy")]
    NoMatchingTag { url: String },

    #[error("git clone of {url} at '{git_ref}' failed: {source}")]
    Clone {
        url: String,
        git_ref: String,
        #[source]
        source: ProcessError,
    },

    #[error("cannot prepare {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of one stage for one target.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error("installing {project} failed with exit code {exit_code}")]
    Install {
        project: String,
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("installing dependencies '{spec}' failed with exit code {exit_code}")]
    DependencyInstall {
        spec: String,
        exit_code: i32,
        output: String,
    },

    #[error("tests failed with exit code {exit_code}")]
    TestFailure { exit_code: i32, output: String },

    #[error("command '{command}' failed with exit code {exit_code}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error(transparent)]
    Process(ProcessError),

    #[error("could not read conda environments: {0}")]
    EnvironmentList(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TargetError {
    /// Short machine-readable category for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            TargetError::Clone(_) => "clone",
            TargetError::Install { .. } => "install",
            TargetError::DependencyInstall { .. } => "dependency_install",
            TargetError::TestFailure { .. } => "test_failure",
            TargetError::CommandFailed { .. } => "command_failed",
            TargetError::Process(_) => "process",
            TargetError::EnvironmentList(_) => "environment",
            TargetError::Io(_) => "io",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TargetError::Install { exit_code, .. }
            | TargetError::DependencyInstall { exit_code, .. }
            | TargetError::TestFailure { exit_code, .. }
            | TargetError::CommandFailed { exit_code, .. } => Some(*exit_code),
            TargetError::Clone(CloneError::ListTags { source, .. })
            | TargetError::Clone(CloneError::Clone { source, .. }) => source.exit_code(),
            _ => None,
        }
    }

    pub fn captured_output(&self) -> &str {
        match self {
            TargetError::Install { output, .. }
            | TargetError::DependencyInstall { output, .. }
            | TargetError::TestFailure { output, .. }
            | TargetError::CommandFailed { output, .. } => output,
            TargetError::Clone(CloneError::ListTags { source, .. })
            | TargetError::Clone(CloneError::Clone { source, .. }) => source.captured_output(),
            _ => "",
        }
    }

    /// Wrap a failed install command of `project`.
    pub fn install(project: &str, err: ProcessError) -> Self {
        match err {
            ProcessError::CommandFailed {
                command,
                exit_code,
                output,
            } => TargetError::Install {
                project: project.to_string(),
                command,
                exit_code,
                output,
            },
            other => TargetError::Process(other),
        }
    }
}

impl From<ProcessError> for TargetError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::CommandFailed {
                command,
                exit_code,
                output,
            } => TargetError::CommandFailed {
                command,
                exit_code,
                output,
            },
            other => TargetError::Process(other),
        }
    }
}

impl From<CondaError> for TargetError {
    fn from(err: CondaError) -> Self {
        match err {
            CondaError::DependencyInstall {
                spec,
                exit_code,
                output,
                ..
            } => TargetError::DependencyInstall {
                spec,
                exit_code,
                output,
            },
            CondaError::TestFailure {
                exit_code, output, ..
            } => TargetError::TestFailure { exit_code, output },
            CondaError::Command(err) => err.into(),
            CondaError::EnvList(err) => TargetError::EnvironmentList(err.to_string()),
        }
    }
}

/// Errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("cannot bootstrap miniconda: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("duplicate target name: {0}")]
    DuplicateTargetName(String),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conda_test_failure_maps_to_test_failure() {
        let err: TargetError = CondaError::TestFailure {
            env: "umap".to_string(),
            exit_code: 1,
            output: "1 failed, 99 passed".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "test_failure");
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.captured_output(), "1 failed, 99 passed");
    }

    #[test]
    fn test_process_failure_maps_to_command_failed() {
        let err: TargetError = ProcessError::CommandFailed {
            command: "conda create -y -n umap".to_string(),
            exit_code: 2,
            output: "CondaHTTPError".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "command_failed");
        assert!(err.to_string().contains("conda create -y -n umap"));
    }

    #[test]
    fn test_install_helper() {
        let err = TargetError::install(
            "numba",
            ProcessError::CommandFailed {
                command: "conda install -y -n umap numba".to_string(),
                exit_code: 1,
                output: "conflict".to_string(),
            },
        );
        assert_eq!(err.kind(), "install");
        assert_eq!(err.to_string(), "installing numba failed with exit code 1");
    }

    #[test]
    fn test_clone_error_exposes_git_output() {
        let err: TargetError = CloneError::Clone {
            url: "https://example.invalid/umap".to_string(),
            git_ref: "0.5.3".to_string(),
            source: ProcessError::CommandFailed {
                command: "git clone".to_string(),
                exit_code: 128,
                output: "Remote branch 0.5.3 not found".to_string(),
            },
        }
        .into();
        assert_eq!(err.kind(), "clone");
        assert_eq!(err.exit_code(), Some(128));
        assert!(err.captured_output().contains("not found"));
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::DuplicateTargetName("umap".to_string());
        assert_eq!(err.to_string(), "duplicate target name: umap");
    }
}
