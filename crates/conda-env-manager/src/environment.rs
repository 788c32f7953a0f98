//! Per-target conda environments
//!
//! One named environment per target, created on first use and reused on
//! every later run. Dependency specifiers are handed to `conda install`
//! token by token, so channel options such as `-c conda-forge` pass through
//! untouched.

use crate::error::{CondaError, Result};
use crate::root::CondaRoot;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use texasbbq_process::{CommandOutput, CommandSpec, ProcessError, ProcessExecutor};
use tracing::{debug, info};

/// A named conda environment beneath the installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Environment name (the target's name).
    pub name: String,

    /// Environment prefix on disk.
    pub prefix: PathBuf,

    /// Whether the environment was created by this call.
    pub created: bool,
}

impl Environment {
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }
}

/// `conda env list --json` output.
#[derive(Debug, Deserialize)]
struct EnvList {
    envs: Vec<PathBuf>,
}

/// Creates, fills and runs commands inside conda environments.
pub struct EnvironmentManager<'a> {
    root: &'a CondaRoot,
    executor: &'a dyn ProcessExecutor,
}

impl<'a> EnvironmentManager<'a> {
    pub fn new(root: &'a CondaRoot, executor: &'a dyn ProcessExecutor) -> Self {
        Self { root, executor }
    }

    fn conda(&self) -> CommandSpec {
        CommandSpec::new(self.root.conda_exe().to_string_lossy())
    }

    /// Environments beneath this root's `envs` directory, keyed by name.
    ///
    /// `conda env list` also reports the base prefix and environments of
    /// other installations; those are left out.
    pub fn list(&self) -> Result<BTreeMap<String, PathBuf>> {
        let output = self.executor.check(&self.conda().args(["env", "list", "--json"]))?;
        parse_env_list(&output.stdout, &self.root.envs_dir())
    }

    /// Reuse the environment called `name`, or create it.
    ///
    /// `python` is a conda match spec for the interpreter (see
    /// [`python_spec`]); it only applies when the environment is created.
    pub fn create_or_reuse(&self, name: &str, python: Option<&str>) -> Result<Environment> {
        if self.list()?.contains_key(name) {
            info!(env = %name, "Reusing existing environment");
            return Ok(Environment {
                name: name.to_string(),
                prefix: self.root.env_prefix(name),
                created: false,
            });
        }

        info!(env = %name, "Creating environment");
        let mut cmd = self.conda().args(["create", "-y", "-n", name]);
        if let Some(spec) = python {
            cmd = cmd.arg(spec);
        }
        self.executor.check(&cmd)?;

        Ok(Environment {
            name: name.to_string(),
            prefix: self.root.env_prefix(name),
            created: true,
        })
    }

    /// `conda install` a single specifier string into `env`.
    pub fn conda_install(
        &self,
        env: &Environment,
        spec: &str,
    ) -> std::result::Result<CommandOutput, ProcessError> {
        let cmd = self
            .conda()
            .args(["install", "-y", "-n", env.name.as_str()])
            .args(split_specifier(spec));
        self.executor.check(&cmd)
    }

    /// Install `specs` in order, one `conda install` per specifier string.
    pub fn install_dependencies(&self, env: &Environment, specs: &[String]) -> Result<()> {
        for spec in specs.iter().filter(|s| !s.trim().is_empty()) {
            debug!(env = %env.name, spec = %spec, "Installing dependencies");
            self.conda_install(env, spec).map_err(|err| match err {
                ProcessError::CommandFailed {
                    exit_code, output, ..
                } => CondaError::DependencyInstall {
                    env: env.name.clone(),
                    spec: spec.clone(),
                    exit_code,
                    output,
                },
                other => CondaError::Command(other),
            })?;
        }
        Ok(())
    }

    /// A shell command that runs with `env` activated.
    pub fn command_in(&self, env: &Environment, command: &str, cwd: &Path) -> CommandSpec {
        let bin = env.bin_dir();
        CommandSpec::shell(command)
            .current_dir(cwd)
            .env("PATH", self.root.search_path(Some(bin.as_path())).to_string_lossy())
            .env("CONDA_PREFIX", env.prefix.to_string_lossy())
            .env("CONDA_DEFAULT_ENV", env.name.as_str())
    }

    /// Run `command` inside `env`, failing on a nonzero exit.
    pub fn run(
        &self,
        env: &Environment,
        command: &str,
        cwd: &Path,
    ) -> std::result::Result<CommandOutput, ProcessError> {
        self.executor.check(&self.command_in(env, command, cwd))
    }

    /// Run the test command inside `env`.
    pub fn run_tests(
        &self,
        env: &Environment,
        test_command: &str,
        cwd: &Path,
    ) -> Result<CommandOutput> {
        let output = self.executor.execute(&self.command_in(env, test_command, cwd))?;
        if output.success() {
            Ok(output)
        } else {
            Err(CondaError::TestFailure {
                env: env.name.clone(),
                exit_code: output.exit_code,
                output: output.combined(),
            })
        }
    }

    /// `conda env export` of `env`, for the record of what was tested.
    pub fn export(&self, env: &Environment) -> Result<String> {
        let output = self
            .executor
            .check(&self.conda().args(["env", "export", "-n", env.name.as_str()]))?;
        Ok(output.stdout)
    }
}

fn parse_env_list(stdout: &str, envs_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let list: EnvList = serde_json::from_str(stdout)?;
    Ok(list
        .envs
        .into_iter()
        .filter(|prefix| prefix.parent().is_some_and(|parent| same_dir(parent, envs_dir)))
        .filter_map(|prefix| {
            let name = prefix.file_name()?.to_string_lossy().to_string();
            Some((name, prefix))
        })
        .collect())
}

/// Path equality, falling back to resolved paths when both exist.
fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Split a dependency specifier into `conda install` arguments.
///
/// `"-c numba numba pytest"` becomes `["-c", "numba", "numba", "pytest"]`.
pub fn split_specifier(spec: &str) -> Vec<String> {
    spec.split_whitespace().map(str::to_string).collect()
}

/// Conda match spec for the interpreter satisfying every constraint.
///
/// Constraints starting with a comparison operator are used as-is; a bare
/// version such as `3.10` means "any 3.10.x". Returns `None` when there is
/// nothing to constrain.
pub fn python_spec<'c, I>(constraints: I) -> Option<String>
where
    I: IntoIterator<Item = &'c str>,
{
    let parts: Vec<String> = constraints
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            if c.starts_with(['<', '>', '=', '!', '~']) || c.ends_with('*') {
                c.to_string()
            } else {
                format!("{c}.*")
            }
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(format!("python[version='{}']", parts.join(",")))
    }
}
