//! Miniconda bootstrap
//!
//! Ensures a private, functional conda installation exists under the
//! installation root. Safe to call on every run: once the conda executable
//! is present, [`RuntimeBootstrap::ensure`] touches neither the network nor
//! any subprocess.

use crate::error::BootstrapError;
use crate::fetch::InstallerFetcher;
use crate::platform::{installer_url, Platform, DEFAULT_INSTALLER_BASE_URL};
use crate::root::CondaRoot;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use texasbbq_process::{CommandSpec, ProcessExecutor};
use tracing::{debug, info};

/// What [`RuntimeBootstrap::ensure`] had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The conda executable was already present; nothing was run.
    AlreadyInstalled,
    /// A fresh install was performed; carries `conda --version` output.
    Installed { version: String },
}

/// Something that can guarantee a package-manager runtime exists.
pub trait RuntimeBootstrap {
    fn ensure(&self) -> Result<BootstrapOutcome, BootstrapError>;
}

/// Bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Base URL the platform installer is downloaded from.
    pub installer_base_url: String,

    /// Where the installer is cached.
    pub installer_path: PathBuf,

    /// Expected SHA-256 of the installer (hex), if pinned.
    pub installer_sha256: Option<String>,

    /// Run `conda update conda` in the base environment after installing.
    pub update_conda: bool,
}

impl BootstrapConfig {
    pub fn new(installer_path: impl Into<PathBuf>) -> Self {
        Self {
            installer_base_url: DEFAULT_INSTALLER_BASE_URL.to_string(),
            installer_path: installer_path.into(),
            installer_sha256: None,
            update_conda: true,
        }
    }
}

/// Installs Miniconda silently into a [`CondaRoot`].
pub struct MinicondaBootstrapper<'a> {
    root: &'a CondaRoot,
    config: BootstrapConfig,
    executor: &'a dyn ProcessExecutor,
    fetcher: &'a dyn InstallerFetcher,
    platform: Option<Platform>,
}

impl<'a> MinicondaBootstrapper<'a> {
    pub fn new(
        root: &'a CondaRoot,
        config: BootstrapConfig,
        executor: &'a dyn ProcessExecutor,
        fetcher: &'a dyn InstallerFetcher,
    ) -> Self {
        Self {
            root,
            config,
            executor,
            fetcher,
            platform: None,
        }
    }

    /// Use `platform` instead of detecting the running one.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    fn obtain_installer(&self) -> Result<(), BootstrapError> {
        let path = &self.config.installer_path;
        if path.is_file() {
            info!("Reusing installer at {:?}", path);
        } else {
            let platform = match self.platform {
                Some(p) => p,
                None => Platform::detect()?,
            };
            let url = installer_url(&self.config.installer_base_url, platform);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.fetcher.fetch(&url, path)?;
        }

        if let Some(expected) = &self.config.installer_sha256 {
            let actual = sha256_file(path)?;
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(BootstrapError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Installer checksum verified");
        }
        Ok(())
    }

    fn install_command(&self) -> CommandSpec {
        let mut cmd = CommandSpec::new("bash")
            .arg(self.config.installer_path.to_string_lossy())
            .arg("-b");
        // A leftover prefix without conda is a half-finished install;
        // the installer refuses an existing prefix unless told to update it.
        if self.root.prefix().exists() {
            cmd = cmd.arg("-u");
        }
        cmd.arg("-p").arg(self.root.prefix().to_string_lossy())
    }

    fn conda(&self) -> CommandSpec {
        CommandSpec::new(self.root.conda_exe().to_string_lossy())
    }
}

impl RuntimeBootstrap for MinicondaBootstrapper<'_> {
    fn ensure(&self) -> Result<BootstrapOutcome, BootstrapError> {
        if self.root.is_installed() {
            info!("Miniconda already installed at {:?}", self.root.prefix());
            return Ok(BootstrapOutcome::AlreadyInstalled);
        }

        info!("Installing Miniconda into {:?}", self.root.prefix());
        self.obtain_installer()?;

        self.executor
            .check(&self.install_command())
            .map_err(BootstrapError::Install)?;

        let version = self
            .executor
            .check(&self.conda().arg("--version"))
            .map_err(BootstrapError::Verify)?
            .stdout
            .trim()
            .to_string();
        info!(version = %version, "Miniconda is functional");

        if self.config.update_conda {
            self.executor
                .check(&self.conda().args(["update", "-y", "-n", "base", "-c", "defaults", "conda"]))
                .map_err(BootstrapError::Update)?;
        }

        Ok(BootstrapOutcome::Installed { version })
    }
}

fn sha256_file(path: &Path) -> Result<String, BootstrapError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
