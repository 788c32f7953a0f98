//! Explicit run context handed to every stage.

use conda_env_manager::{CondaRoot, Environment, EnvironmentManager};
use std::path::{Path, PathBuf};
use texasbbq_process::ProcessExecutor;

/// Filesystem locations of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    work_dir: PathBuf,
    conda_root: CondaRoot,
}

impl RunContext {
    pub fn new(work_dir: impl Into<PathBuf>, conda_root: CondaRoot) -> Self {
        Self {
            work_dir: work_dir.into(),
            conda_root,
        }
    }

    /// Directory clones and per-project working directories live in.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn conda_root(&self) -> &CondaRoot {
        &self.conda_root
    }

    /// Working directory of the project called `name`.
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

/// Everything a project needs to install itself.
pub struct InstallContext<'a> {
    pub run: &'a RunContext,
    pub executor: &'a dyn ProcessExecutor,
    pub environments: EnvironmentManager<'a>,
}

impl<'a> InstallContext<'a> {
    pub fn new(run: &'a RunContext, executor: &'a dyn ProcessExecutor) -> Self {
        Self {
            run,
            executor,
            environments: EnvironmentManager::new(run.conda_root(), executor),
        }
    }

    /// Handle on the environment of `target`, without checking that it exists.
    ///
    /// Stages after `environment` use this directly; if the environment is
    /// missing, the conda or test command fails on its own.
    pub fn environment(&self, target: &str) -> Environment {
        Environment {
            name: target.to_string(),
            prefix: self.run.conda_root().env_prefix(target),
            created: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texasbbq_process::fakes::ScriptedExecutor;

    #[test]
    fn test_project_dir() {
        let run = RunContext::new("/work", CondaRoot::new("/work/miniconda3"));
        assert_eq!(run.project_dir("umap"), PathBuf::from("/work/umap"));
    }

    #[test]
    fn test_environment_handle_runs_nothing() {
        let run = RunContext::new("/work", CondaRoot::new("/work/miniconda3"));
        let exec = ScriptedExecutor::new();
        let cx = InstallContext::new(&run, &exec);

        let env = cx.environment("umap");
        assert_eq!(env.prefix, PathBuf::from("/work/miniconda3/envs/umap"));
        assert!(exec.calls().is_empty());
    }
}
