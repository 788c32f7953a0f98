//! texasbbq-process: blocking subprocess execution
//!
//! Every external tool texasbbq drives (`conda`, `git`, `bash`, the
//! project's own install and test commands) goes through the
//! [`ProcessExecutor`] trait defined here.
//!
//! Execution is strictly synchronous: a call returns only after the child
//! has exited, and its stdout/stderr are captured so that failures can be
//! reported together with what the tool printed.

pub mod error;
pub mod executor;
pub mod fakes;

pub use error::{ProcessError, Result};
pub use executor::{CommandOutput, CommandSpec, ProcessExecutor, SystemExecutor};
