//! conda-env-manager: Miniconda bootstrap and per-target environments
//!
//! This crate provides the environment layer for texasbbq. It makes sure a
//! private Miniconda installation exists and manages one named conda
//! environment per downstream target beneath it.
//!
//! ## Layout on disk
//!
//! ```text
//! <work_dir>/miniconda.sh            cached installer
//! <work_dir>/miniconda3/             installation root (CondaRoot)
//! <work_dir>/miniconda3/envs/<name>  one environment per target
//! ```
//!
//! Every operation shells out through a [`texasbbq_process::ProcessExecutor`]
//! and blocks until the child exits.

pub mod bootstrap;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod platform;
pub mod root;

pub use bootstrap::{BootstrapConfig, BootstrapOutcome, MinicondaBootstrapper, RuntimeBootstrap};
pub use environment::{python_spec, split_specifier, Environment, EnvironmentManager};
pub use error::{BootstrapError, CondaError, Result};
pub use fetch::{HttpFetcher, InstallerFetcher};
pub use platform::{installer_url, Platform, DEFAULT_INSTALLER_BASE_URL, INSTALLER_FILE_NAME};
pub use root::CondaRoot;
