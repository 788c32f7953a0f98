//! texasbbq Core Library
//!
//! Smoke out the bugs that break dependent projects: install a *source*
//! project into the environments of several downstream *targets* and run
//! the targets' test suites against it.
//!
//! A run walks the fixed stage order `miniconda → environment →
//! install_source → install_target → tests`, one target at a time. A
//! failing target is recorded and the run moves on to the next one.

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod git;
pub mod pipeline;
pub mod project;
pub mod report;
pub mod stage;
pub mod telemetry;

pub use config::{Configuration, Settings};
pub use context::{InstallContext, RunContext};
pub use discovery::TargetRegistry;
pub use error::{CloneError, ConfigError, RunError, TargetError};
pub use git::{parse_ls_remote, resolve_ref, ReleasePolicy};
pub use pipeline::{RunRequest, StageOrchestrator};
pub use project::{
    CloneInstall, GitRef, InstallStrategy, Installable, PackageInstall, Source, Target,
    TargetProject,
};
pub use report::{FailureReport, RunResult, StageOutcome, StageStatus, TargetOutcome};
pub use stage::{Stage, UnknownStage};
pub use telemetry::init_tracing;

/// texasbbq version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status used when at least one target failed.
pub const EXIT_TARGETS_FAILED: i32 = 23;
