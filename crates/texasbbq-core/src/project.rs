//! Source and target project definitions.
//!
//! A project is installed either as a conda package or by cloning its
//! repository and running an install command inside the clone. The two
//! ways are the variants of [`InstallStrategy`]; [`Installable`] is the
//! capability every project offers the pipeline.

use crate::context::{InstallContext, RunContext};
use crate::error::{CloneError, ConfigError, TargetError};
use crate::git::{self, ReleasePolicy};
use conda_env_manager::Environment;
use std::cell::OnceCell;
use std::path::PathBuf;
use texasbbq_process::ProcessExecutor;
use tracing::{debug, info};

/// Which revision of a repository to check out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    /// A branch or tag name, used as given.
    Fixed(String),
    /// The newest release tag on the remote, chosen by policy.
    LatestRelease(ReleasePolicy),
}

/// Install by `conda install`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstall {
    /// Package reference, optionally with channel options (`-c numba numba`).
    pub package: String,
}

/// Install by shallow clone plus an install command run inside the clone.
#[derive(Debug, Clone)]
pub struct CloneInstall {
    pub clone_url: String,
    pub git_ref: GitRef,
    pub install_command: String,
    resolved: OnceCell<String>,
}

impl CloneInstall {
    pub fn new(clone_url: &str, git_ref: GitRef, install_command: &str) -> Self {
        Self {
            clone_url: clone_url.to_string(),
            git_ref,
            install_command: install_command.to_string(),
            resolved: OnceCell::new(),
        }
    }

    /// The concrete ref to clone.
    ///
    /// A [`GitRef::LatestRelease`] is resolved against the remote's tags on
    /// the first call; every later call returns that same ref.
    pub fn resolved_ref(&self, executor: &dyn ProcessExecutor) -> Result<&str, CloneError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }

        let resolved = match &self.git_ref {
            GitRef::Fixed(name) => name.clone(),
            GitRef::LatestRelease(policy) => {
                let tags = git::ls_remote_tags(executor, &self.clone_url).map_err(|source| {
                    CloneError::ListTags {
                        url: self.clone_url.clone(),
                        source,
                    }
                })?;
                let tag = git::resolve_ref(&tags, policy).ok_or_else(|| CloneError::NoMatchingTag {
                    url: self.clone_url.clone(),
                })?;
                info!(url = %self.clone_url, tag = %tag, "Resolved latest release");
                tag
            }
        };
        Ok(self.resolved.get_or_init(|| resolved))
    }
}

/// How a project gets into an environment.
#[derive(Debug, Clone)]
pub enum InstallStrategy {
    Package(PackageInstall),
    Clone(CloneInstall),
}

impl InstallStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            InstallStrategy::Package(_) => "package",
            InstallStrategy::Clone(_) => "clone",
        }
    }
}

/// A project that can be installed into a conda environment.
pub trait Installable {
    fn name(&self) -> &str;

    fn strategy(&self) -> &InstallStrategy;

    /// Conda dependency specifiers, installed in order.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Interpreter constraint, such as `>=3.9` or `3.10`.
    fn python(&self) -> Option<&str> {
        None
    }

    /// Whether [`Installable::install`] also installs
    /// [`Installable::dependencies`].
    fn installs_own_dependencies(&self) -> bool {
        false
    }

    /// Directory the project's commands run in.
    fn work_dir(&self, run: &RunContext) -> PathBuf {
        run.project_dir(self.name())
    }

    /// Make the project's working directory available.
    ///
    /// Clone projects are cloned at their resolved ref unless the directory
    /// already exists; package projects just get an empty directory.
    fn acquire(&self, cx: &InstallContext<'_>) -> Result<PathBuf, CloneError> {
        let dir = self.work_dir(cx.run);
        match self.strategy() {
            InstallStrategy::Clone(clone) => {
                if dir.exists() {
                    debug!(project = %self.name(), "Reusing existing clone at {:?}", dir);
                    return Ok(dir);
                }
                let git_ref = clone.resolved_ref(cx.executor)?.to_string();
                info!(project = %self.name(), git_ref = %git_ref, "Cloning {}", clone.clone_url);
                git::clone_ref(cx.executor, &clone.clone_url, &git_ref, &dir).map_err(
                    |source| CloneError::Clone {
                        url: clone.clone_url.clone(),
                        git_ref,
                        source,
                    },
                )?;
            }
            InstallStrategy::Package(_) => {
                std::fs::create_dir_all(&dir).map_err(|source| CloneError::Io {
                    path: dir.clone(),
                    source,
                })?;
            }
        }
        Ok(dir)
    }

    /// Install the project into `env`.
    fn install(&self, cx: &InstallContext<'_>, env: &Environment) -> Result<(), TargetError> {
        debug!(project = %self.name(), strategy = self.strategy().kind(), env = %env.name, "Install");
        match self.strategy() {
            InstallStrategy::Package(package) => {
                if self.installs_own_dependencies() {
                    cx.environments.install_dependencies(env, self.dependencies())?;
                }
                info!(project = %self.name(), env = %env.name, "Installing package {}", package.package);
                cx.environments
                    .conda_install(env, &package.package)
                    .map_err(|err| TargetError::install(self.name(), err))?;
            }
            InstallStrategy::Clone(clone) => {
                let dir = self.acquire(cx)?;
                if self.installs_own_dependencies() {
                    cx.environments.install_dependencies(env, self.dependencies())?;
                }
                info!(project = %self.name(), env = %env.name, "Running install command in {:?}", dir);
                cx.environments
                    .run(env, &clone.install_command, &dir)
                    .map_err(|err| TargetError::install(self.name(), err))?;
            }
        }
        Ok(())
    }

    /// Check the definition is usable.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_project(self.name(), self.strategy())
    }
}

/// A downstream project whose test suite is run.
pub trait TargetProject: Installable {
    fn test_command(&self) -> &str;
}

fn invalid(project: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        project: project.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_project(name: &str, strategy: &InstallStrategy) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }
    // The name doubles as environment name and directory name.
    if name == "." || name == ".." || name.contains(['/', '\\']) || name.contains(char::is_whitespace)
    {
        return Err(invalid(name, "name must be a single path component without spaces"));
    }
    match strategy {
        InstallStrategy::Package(p) if p.package.trim().is_empty() => {
            Err(invalid(name, "package must not be empty"))
        }
        InstallStrategy::Clone(c) if c.clone_url.trim().is_empty() => {
            Err(invalid(name, "clone_url must not be empty"))
        }
        InstallStrategy::Clone(c) if c.install_command.trim().is_empty() => {
            Err(invalid(name, "install_command must not be empty"))
        }
        InstallStrategy::Clone(CloneInstall {
            git_ref: GitRef::Fixed(r),
            ..
        }) if r.trim().is_empty() => Err(invalid(name, "git_ref must not be empty")),
        _ => Ok(()),
    }
}

/// The project under test.
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    strategy: InstallStrategy,
    dependencies: Vec<String>,
    python: Option<String>,
}

impl Source {
    /// A source installed with `conda install <package>`.
    pub fn package(name: &str, package: &str) -> Self {
        Self::new(
            name,
            InstallStrategy::Package(PackageInstall {
                package: package.to_string(),
            }),
        )
    }

    /// A source built from a clone of its repository.
    pub fn from_git(name: &str, clone: CloneInstall) -> Self {
        Self::new(name, InstallStrategy::Clone(clone))
    }

    pub fn new(name: &str, strategy: InstallStrategy) -> Self {
        Self {
            name: name.to_string(),
            strategy,
            dependencies: Vec::new(),
            python: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_python(mut self, constraint: &str) -> Self {
        self.python = Some(constraint.to_string());
        self
    }
}

impl Installable for Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> &InstallStrategy {
        &self.strategy
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn python(&self) -> Option<&str> {
        self.python.as_deref()
    }

    /// The `environment` stage only knows about the target's dependencies,
    /// so the source brings its own.
    fn installs_own_dependencies(&self) -> bool {
        true
    }
}

/// A downstream project defined by configuration.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    strategy: InstallStrategy,
    dependencies: Vec<String>,
    python: Option<String>,
    test_command: String,
}

impl Target {
    /// A target installed with `conda install <package>`.
    pub fn package(name: &str, package: &str, test_command: &str) -> Self {
        Self::new(
            name,
            InstallStrategy::Package(PackageInstall {
                package: package.to_string(),
            }),
            test_command,
        )
    }

    /// A target cloned from its repository.
    pub fn from_git(name: &str, clone: CloneInstall, test_command: &str) -> Self {
        Self::new(name, InstallStrategy::Clone(clone), test_command)
    }

    pub fn new(name: &str, strategy: InstallStrategy, test_command: &str) -> Self {
        Self {
            name: name.to_string(),
            strategy,
            dependencies: Vec::new(),
            python: None,
            test_command: test_command.to_string(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_python(mut self, constraint: &str) -> Self {
        self.python = Some(constraint.to_string());
        self
    }
}

impl Installable for Target {
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> &InstallStrategy {
        &self.strategy
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn python(&self) -> Option<&str> {
        self.python.as_deref()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_project(&self.name, &self.strategy)?;
        if self.test_command.trim().is_empty() {
            return Err(invalid(&self.name, "test_command must not be empty"));
        }
        Ok(())
    }
}

impl TargetProject for Target {
    fn test_command(&self) -> &str {
        &self.test_command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conda_env_manager::CondaRoot;
    use tempfile::tempdir;
    use texasbbq_process::fakes::ScriptedExecutor;

    fn umap(git_ref: GitRef) -> Target {
        Target::from_git(
            "umap",
            CloneInstall::new("https://github.com/lmcinnes/umap", git_ref, "pip install -e ."),
            "pytest",
        )
        .with_dependencies(["numpy pytest scipy"])
    }

    #[test]
    fn test_latest_release_resolved_once() {
        let exec = ScriptedExecutor::new();
        exec.respond(
            "ls-remote",
            "a\trefs/tags/0.5.3\nb\trefs/tags/v0.9.0\nc\trefs/tags/0.5.4\n",
        );
        let clone = CloneInstall::new(
            "https://github.com/lmcinnes/umap",
            GitRef::LatestRelease(ReleasePolicy {
                v_prefix: false,
                exclude_prefix: Some("v".to_string()),
            }),
            "pip install -e .",
        );

        assert_eq!(clone.resolved_ref(&exec).unwrap(), "0.5.4");

        // A newer tag appearing mid-run does not change the pinned ref.
        exec.respond("ls-remote", "d\trefs/tags/0.6.0\n");
        assert_eq!(clone.resolved_ref(&exec).unwrap(), "0.5.4");
        assert_eq!(exec.count("ls-remote"), 1);
    }

    #[test]
    fn test_fixed_ref_needs_no_remote() {
        let exec = ScriptedExecutor::new();
        let clone = CloneInstall::new("url", GitRef::Fixed("master".to_string()), "make");
        assert_eq!(clone.resolved_ref(&exec).unwrap(), "master");
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_no_matching_tag() {
        let exec = ScriptedExecutor::new();
        exec.respond("ls-remote", "a\trefs/tags/nightly\n");
        let clone = CloneInstall::new(
            "url",
            GitRef::LatestRelease(ReleasePolicy::default()),
            "make",
        );
        assert!(matches!(
            clone.resolved_ref(&exec).unwrap_err(),
            CloneError::NoMatchingTag { .. }
        ));
    }

    #[test]
    fn test_acquire_clones_once() {
        let dir = tempdir().unwrap();
        let run = RunContext::new(dir.path(), CondaRoot::new(dir.path().join("miniconda3")));
        let exec = ScriptedExecutor::new();
        let cx = InstallContext::new(&run, &exec);
        let target = umap(GitRef::Fixed("0.5.3".to_string()));

        let clone_dir = target.acquire(&cx).unwrap();
        assert_eq!(clone_dir, dir.path().join("umap"));
        assert_eq!(exec.count("git clone -b 0.5.3 https://github.com/lmcinnes/umap --depth=1"), 1);

        // the fake executor does not create the directory, so do it here
        std::fs::create_dir_all(&clone_dir).unwrap();
        target.acquire(&cx).unwrap();
        assert_eq!(exec.count("git clone"), 1);
    }

    #[test]
    fn test_acquire_clone_failure() {
        let dir = tempdir().unwrap();
        let run = RunContext::new(dir.path(), CondaRoot::new(dir.path().join("miniconda3")));
        let exec = ScriptedExecutor::new();
        exec.fail("git clone", 128, "fatal: Remote branch 9.9.9 not found");
        let cx = InstallContext::new(&run, &exec);
        let target = umap(GitRef::Fixed("9.9.9".to_string()));

        match target.acquire(&cx).unwrap_err() {
            CloneError::Clone { git_ref, source, .. } => {
                assert_eq!(git_ref, "9.9.9");
                assert!(source.captured_output().contains("not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_package_source_install() {
        let dir = tempdir().unwrap();
        let run = RunContext::new(dir.path(), CondaRoot::new("/c"));
        let exec = ScriptedExecutor::new();
        let cx = InstallContext::new(&run, &exec);
        let source = Source::package("numba", "-c numba/label/dev numba");

        source.install(&cx, &cx.environment("umap")).unwrap();
        assert_eq!(
            exec.command_lines(),
            vec!["/c/bin/conda install -y -n umap -c numba/label/dev numba"]
        );
    }

    #[test]
    fn test_clone_source_installs_dependencies_then_command() {
        let dir = tempdir().unwrap();
        let run = RunContext::new(dir.path(), CondaRoot::new("/c"));
        let exec = ScriptedExecutor::new();
        let cx = InstallContext::new(&run, &exec);
        let source = Source::from_git(
            "numba",
            CloneInstall::new(
                "https://github.com/numba/numba",
                GitRef::Fixed("main".to_string()),
                "python setup.py develop",
            ),
        )
        .with_dependencies(["llvmlite numpy"]);

        source.install(&cx, &cx.environment("umap")).unwrap();
        let lines = exec.command_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("git clone -b main"));
        assert_eq!(lines[1], "/c/bin/conda install -y -n umap llvmlite numpy");
        assert_eq!(lines[2], "sh -c python setup.py develop");
        assert_eq!(exec.calls()[2].cwd, Some(dir.path().join("numba")));
    }

    #[test]
    fn test_clone_target_does_not_install_dependencies() {
        let dir = tempdir().unwrap();
        let run = RunContext::new(dir.path(), CondaRoot::new("/c"));
        let exec = ScriptedExecutor::new();
        let cx = InstallContext::new(&run, &exec);
        let target = umap(GitRef::Fixed("0.5.3".to_string()));

        target.install(&cx, &cx.environment("umap")).unwrap();
        assert_eq!(exec.count("conda install"), 0);
        assert_eq!(exec.count("pip install -e ."), 1);
    }

    #[test]
    fn test_install_command_failure_is_install_error() {
        let dir = tempdir().unwrap();
        let run = RunContext::new(dir.path(), CondaRoot::new("/c"));
        let exec = ScriptedExecutor::new();
        exec.fail("pip install", 1, "error: subprocess-exited-with-error");
        let cx = InstallContext::new(&run, &exec);
        let target = umap(GitRef::Fixed("0.5.3".to_string()));

        let err = target.install(&cx, &cx.environment("umap")).unwrap_err();
        assert_eq!(err.kind(), "install");
        assert!(err.captured_output().contains("subprocess-exited-with-error"));
    }

    #[test]
    fn test_validate() {
        assert!(umap(GitRef::Fixed("main".to_string())).validate().is_ok());
        assert!(Source::package("numba", "numba").validate().is_ok());

        assert!(Source::package("", "numba").validate().is_err());
        assert!(Source::package("a/b", "numba").validate().is_err());
        assert!(Source::package("numba", "  ").validate().is_err());
        assert!(Target::package("umap", "umap-learn", "").validate().is_err());
        assert!(umap(GitRef::Fixed(String::new())).validate().is_err());
    }

    #[test]
    fn test_strategy_kind() {
        assert_eq!(Source::package("numba", "numba").strategy().kind(), "package");
        assert_eq!(
            umap(GitRef::Fixed("main".to_string())).strategy().kind(),
            "clone"
        );
    }
}
