//! Configuration loading.
//!
//! A TOML file describes the run settings, the single source project and
//! the target projects. Raw records are deserialized with serde and then
//! validated into immutable [`Source`] and [`Target`] values; nothing that
//! fails validation reaches the pipeline.

use crate::context::RunContext;
use crate::discovery::TargetRegistry;
use crate::error::{ConfigError, RunError};
use crate::git::ReleasePolicy;
use crate::project::{
    CloneInstall, GitRef, InstallStrategy, Installable, PackageInstall, Source, Target,
    TargetProject,
};
use conda_env_manager::{BootstrapConfig, CondaRoot, DEFAULT_INSTALLER_BASE_URL, INSTALLER_FILE_NAME};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "texasbbq.toml";

const ENV_WORK_DIR: &str = "TEXASBBQ_WORK_DIR";
const ENV_CONDA_ROOT: &str = "TEXASBBQ_CONDA_ROOT";
const ENV_INSTALLER_URL: &str = "TEXASBBQ_INSTALLER_URL";

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory clones live in; also holds the cached installer.
    pub work_dir: PathBuf,

    /// Conda installation root. Relative paths are taken from `work_dir`.
    pub conda_root: PathBuf,

    pub installer_base_url: String,

    /// Expected SHA-256 of the installer, if pinned.
    pub installer_sha256: Option<String>,

    /// Update conda in the base environment after a fresh install.
    pub update_conda: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            work_dir: PathBuf::from("."),
            conda_root: PathBuf::from("miniconda3"),
            installer_base_url: DEFAULT_INSTALLER_BASE_URL.to_string(),
            installer_sha256: None,
            update_conda: true,
        }
    }
}

impl Settings {
    /// Apply `TEXASBBQ_*` environment variable overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_WORK_DIR) {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup(ENV_CONDA_ROOT) {
            self.conda_root = PathBuf::from(root);
        }
        if let Some(url) = lookup(ENV_INSTALLER_URL) {
            self.installer_base_url = url;
        }
        self
    }

    /// Absolute or work-dir-relative conda installation root.
    pub fn conda_root_path(&self) -> PathBuf {
        if self.conda_root.is_absolute() {
            self.conda_root.clone()
        } else {
            self.work_dir.join(&self.conda_root)
        }
    }

    /// Where the Miniconda installer is cached between runs.
    pub fn installer_path(&self) -> PathBuf {
        self.work_dir.join(INSTALLER_FILE_NAME)
    }

    /// Entries of `work_dir` that belong to the run rather than a project.
    fn reserved_names(&self) -> Vec<String> {
        let installer = self.installer_path();
        let mut names = vec![INSTALLER_FILE_NAME.to_string()];
        if let Some(partial) = installer.with_extension("part").file_name() {
            names.push(partial.to_string_lossy().to_string());
        }
        let root = self.conda_root_path();
        let first = root
            .strip_prefix(&self.work_dir)
            .ok()
            .and_then(|rest| rest.components().next());
        if let Some(Component::Normal(first)) = first {
            names.push(first.to_string_lossy().to_string());
        }
        names
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            installer_base_url: self.installer_base_url.clone(),
            installer_path: self.installer_path(),
            installer_sha256: self.installer_sha256.clone(),
            update_conda: self.update_conda,
        }
    }

    pub fn run_context(&self) -> RunContext {
        RunContext::new(&self.work_dir, CondaRoot::new(self.conda_root_path()))
    }
}

/// A validated configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub settings: Settings,
    pub source: Source,
    pub targets: Vec<Target>,
}

impl Configuration {
    /// Read and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        raw.validate()
    }

    /// Reject targets whose directory under `settings.work_dir` would be
    /// the source checkout, the conda root or the cached installer.
    pub fn check_target_names(&self, settings: &Settings) -> Result<(), ConfigError> {
        let mut reserved = settings.reserved_names();
        reserved.push(self.source.name().to_string());
        match self
            .targets
            .iter()
            .find(|t| reserved.iter().any(|name| name == t.name()))
        {
            Some(target) => Err(invalid(
                target.name(),
                &format!("name clashes with {:?} in the work dir", target.name()),
            )),
            None => Ok(()),
        }
    }

    /// Register the configured targets, rejecting duplicate names.
    pub fn target_registry(&self) -> Result<TargetRegistry, RunError> {
        TargetRegistry::discover(
            self.targets
                .iter()
                .cloned()
                .map(|t| Box::new(t) as Box<dyn TargetProject>),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    settings: RawSettings,
    source: RawProject,
    #[serde(default)]
    targets: Vec<RawProject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    work_dir: Option<PathBuf>,
    conda_root: Option<PathBuf>,
    installer_base_url: Option<String>,
    installer_sha256: Option<String>,
    update_conda: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: String,
    package: Option<String>,
    clone_url: Option<String>,
    git_ref: Option<RawGitRef>,
    install_command: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    python: Option<String>,
    test_command: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGitRef {
    Fixed(String),
    Policy { latest_release: ReleasePolicy },
}

impl RawConfig {
    fn validate(self) -> Result<Configuration, ConfigError> {
        let defaults = Settings::default();
        let settings = Settings {
            work_dir: self.settings.work_dir.unwrap_or(defaults.work_dir),
            conda_root: self.settings.conda_root.unwrap_or(defaults.conda_root),
            installer_base_url: self
                .settings
                .installer_base_url
                .unwrap_or(defaults.installer_base_url),
            installer_sha256: self.settings.installer_sha256,
            update_conda: self.settings.update_conda.unwrap_or(defaults.update_conda),
        };

        if self.source.test_command.is_some() {
            return Err(invalid(&self.source.name, "the source has no test_command"));
        }
        let mut source = Source::new(&self.source.name, self.source.strategy()?)
            .with_dependencies(self.source.dependencies);
        if let Some(python) = &self.source.python {
            source = source.with_python(python);
        }
        source.validate()?;

        let targets = self
            .targets
            .into_iter()
            .map(RawProject::into_target)
            .collect::<Result<Vec<_>, _>>()?;

        let config = Configuration {
            settings,
            source,
            targets,
        };
        config.check_target_names(&config.settings)?;
        Ok(config)
    }
}

impl RawProject {
    fn strategy(&self) -> Result<InstallStrategy, ConfigError> {
        match (&self.package, &self.clone_url) {
            (Some(package), None) => {
                if self.git_ref.is_some() || self.install_command.is_some() {
                    return Err(invalid(
                        &self.name,
                        "git_ref and install_command only apply to clone projects",
                    ));
                }
                Ok(InstallStrategy::Package(PackageInstall {
                    package: package.clone(),
                }))
            }
            (None, Some(url)) => {
                let git_ref = match &self.git_ref {
                    Some(RawGitRef::Fixed(name)) => GitRef::Fixed(name.clone()),
                    Some(RawGitRef::Policy { latest_release }) => {
                        GitRef::LatestRelease(latest_release.clone())
                    }
                    None => return Err(invalid(&self.name, "clone projects need a git_ref")),
                };
                let install_command = self
                    .install_command
                    .as_deref()
                    .ok_or_else(|| invalid(&self.name, "clone projects need an install_command"))?;
                Ok(InstallStrategy::Clone(CloneInstall::new(
                    url,
                    git_ref,
                    install_command,
                )))
            }
            (Some(_), Some(_)) => Err(invalid(
                &self.name,
                "set either package or clone_url, not both",
            )),
            (None, None) => Err(invalid(&self.name, "set one of package or clone_url")),
        }
    }

    fn into_target(self) -> Result<Target, ConfigError> {
        let test_command = self
            .test_command
            .as_deref()
            .ok_or_else(|| invalid(&self.name, "targets need a test_command"))?;
        let mut target = Target::new(&self.name, self.strategy()?, test_command)
            .with_dependencies(self.dependencies.iter().cloned());
        if let Some(python) = &self.python {
            target = target.with_python(python);
        }
        target.validate()?;
        Ok(target)
    }
}

fn invalid(project: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        project: project.to_string(),
        reason: reason.to_string(),
    }
}
