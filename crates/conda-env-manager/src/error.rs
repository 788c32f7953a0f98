//! Error types for conda-env-manager

use texasbbq_process::ProcessError;
use thiserror::Error;

/// Errors that prevent a working Miniconda installation.
///
/// Any of these is fatal to a whole run.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// No Miniconda installer is published for this OS/architecture
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The installer could not be downloaded
    #[error("failed to download installer from {url}: {reason}")]
    Download { url: String, reason: String },

    /// The downloaded installer does not match the configured digest
    #[error("installer checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The silent install exited nonzero
    #[error("installer failed: {0}")]
    Install(#[source] ProcessError),

    /// The installed conda does not answer `conda --version`
    #[error("conda is not functional after install: {0}")]
    Verify(#[source] ProcessError),

    /// Updating conda in the base environment failed
    #[error("conda self-update failed: {0}")]
    Update(#[source] ProcessError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BootstrapError {
    fn from(err: reqwest::Error) -> Self {
        BootstrapError::Download {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: err.to_string(),
        }
    }
}

/// Errors from operations on individual environments.
#[derive(Error, Debug)]
pub enum CondaError {
    /// A conda (or environment-scoped) command failed
    #[error("conda command failed: {0}")]
    Command(#[from] ProcessError),

    /// `conda env list --json` printed something unexpected
    #[error("could not parse environment list: {0}")]
    EnvList(#[from] serde_json::Error),

    /// Installing one dependency specifier failed
    #[error("installing '{spec}' into '{env}' failed with exit code {exit_code}")]
    DependencyInstall {
        env: String,
        spec: String,
        exit_code: i32,
        output: String,
    },

    /// The test command exited nonzero
    #[error("tests in '{env}' failed with exit code {exit_code}")]
    TestFailure {
        env: String,
        exit_code: i32,
        output: String,
    },
}

impl CondaError {
    /// Exit code of the failing child, if it ran.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CondaError::Command(err) => err.exit_code(),
            CondaError::DependencyInstall { exit_code, .. }
            | CondaError::TestFailure { exit_code, .. } => Some(*exit_code),
            CondaError::EnvList(_) => None,
        }
    }

    /// Output captured from the failing child.
    pub fn captured_output(&self) -> &str {
        match self {
            CondaError::Command(err) => err.captured_output(),
            CondaError::DependencyInstall { output, .. }
            | CondaError::TestFailure { output, .. } => output,
            CondaError::EnvList(_) => "",
        }
    }
}

/// Result type for environment operations
pub type Result<T> = std::result::Result<T, CondaError>;
