//! Stage orchestration.
//!
//! [`StageOrchestrator::run`] walks the requested stages in canonical order
//! and, inside each per-target stage, the selected targets in registry
//! order. Everything runs sequentially on the calling thread: environments
//! share one conda installation root, which must never be mutated by two
//! commands at once.

use crate::context::{InstallContext, RunContext};
use crate::discovery::TargetRegistry;
use crate::error::{RunError, TargetError};
use crate::project::{InstallStrategy, Installable, TargetProject};
use crate::report::{RunResult, StageOutcome};
use crate::stage::Stage;
use conda_env_manager::{python_spec, BootstrapOutcome, RuntimeBootstrap};
use std::time::Instant;
use texasbbq_process::ProcessExecutor;
use tracing::{debug, error, info, warn};

/// The resolved stage and target selection of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Canonical subsequence of [`Stage::ALL`].
    pub stages: Vec<Stage>,
    /// Target names in registry order.
    pub targets: Vec<String>,
}

impl RunRequest {
    /// Resolve a selection against `registry`. `None` means "all".
    pub fn new(
        stages: Option<&[Stage]>,
        targets: Option<&[String]>,
        registry: &TargetRegistry,
    ) -> Result<Self, RunError> {
        let stages = match stages {
            Some(requested) => Stage::canonical(requested.iter().copied()),
            None => Stage::ALL.to_vec(),
        };
        Ok(RunRequest {
            stages,
            targets: registry.select(targets)?,
        })
    }

    /// Every stage against every target.
    pub fn all(registry: &TargetRegistry) -> Self {
        RunRequest {
            stages: Stage::ALL.to_vec(),
            targets: registry.names().into_iter().map(str::to_string).collect(),
        }
    }
}

/// Drives a run through its stages.
pub struct StageOrchestrator<'a> {
    run: &'a RunContext,
    executor: &'a dyn ProcessExecutor,
    bootstrapper: &'a dyn RuntimeBootstrap,
}

impl<'a> StageOrchestrator<'a> {
    pub fn new(
        run: &'a RunContext,
        executor: &'a dyn ProcessExecutor,
        bootstrapper: &'a dyn RuntimeBootstrap,
    ) -> Self {
        Self {
            run,
            executor,
            bootstrapper,
        }
    }

    /// Run `request` for `source` against the targets of `registry`.
    ///
    /// Only run-fatal errors are returned: a failed bootstrap, an invalid
    /// source or a target name the registry does not know. Per-target
    /// failures end up in the [`RunResult`].
    pub fn run(
        &self,
        source: &dyn Installable,
        registry: &TargetRegistry,
        request: &RunRequest,
    ) -> Result<RunResult, RunError> {
        source.validate()?;
        let targets = request
            .targets
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .ok_or_else(|| RunError::UnknownTarget(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = RunResult::new(&request.stages, targets.iter().map(|t| t.name()));
        let cx = InstallContext::new(self.run, self.executor);
        info!(
            run_id = %result.run_id,
            source = %source.name(),
            targets = targets.len(),
            "Starting run"
        );

        for &stage in &request.stages {
            info!(stage = %stage, "Running stage");
            if stage.is_global() {
                result.bootstrap = Some(self.bootstrap()?);
                continue;
            }

            for &target in &targets {
                if result.has_failed(target.name()) {
                    debug!(stage = %stage, target = %target.name(), "Skipping after earlier failure");
                    result.record(target.name(), StageOutcome::skipped(stage));
                    continue;
                }

                let started = Instant::now();
                let outcome = self.run_stage(stage, source, target, &cx);
                let duration_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(()) => {
                        info!(stage = %stage, target = %target.name(), duration_ms, "Stage passed");
                        result.record(target.name(), StageOutcome::passed(stage, duration_ms));
                    }
                    Err(err) => {
                        error!(stage = %stage, target = %target.name(), kind = err.kind(), "{}", err);
                        if !err.captured_output().is_empty() {
                            error!(target = %target.name(), "Captured output:\n{}", err.captured_output());
                        }
                        result.record(
                            target.name(),
                            StageOutcome::failed(stage, &err, duration_ms),
                        );
                    }
                }
            }
        }

        result.finish();
        match result.failure_report() {
            Some(report) => warn!("{}", report),
            None => info!(targets = targets.len(), "All targets passed"),
        }
        Ok(result)
    }

    fn bootstrap(&self) -> Result<String, RunError> {
        let outcome = self.bootstrapper.ensure()?;
        Ok(match outcome {
            BootstrapOutcome::AlreadyInstalled => {
                info!(root = ?self.run.conda_root().prefix(), "Miniconda already installed");
                "already_installed".to_string()
            }
            BootstrapOutcome::Installed { version } => {
                info!(root = ?self.run.conda_root().prefix(), version = %version, "Miniconda installed");
                format!("installed {}", version)
            }
        })
    }

    fn run_stage(
        &self,
        stage: Stage,
        source: &dyn Installable,
        target: &dyn TargetProject,
        cx: &InstallContext<'_>,
    ) -> Result<(), TargetError> {
        match stage {
            // global; handled by `run`
            Stage::Miniconda => Ok(()),
            Stage::Environment => {
                let python = python_spec(source.python().into_iter().chain(target.python()));
                let env = cx
                    .environments
                    .create_or_reuse(target.name(), python.as_deref())?;
                cx.environments
                    .install_dependencies(&env, target.dependencies())?;
                Ok(())
            }
            Stage::InstallSource => source.install(cx, &cx.environment(target.name())),
            Stage::InstallTarget => target.install(cx, &cx.environment(target.name())),
            Stage::Tests => {
                let env = cx.environment(target.name());
                match cx.environments.export(&env) {
                    Ok(export) => info!(target = %target.name(), "Environment:\n{}", export),
                    Err(err) => warn!(target = %target.name(), "Could not export environment: {}", err),
                }
                let dir = match target.strategy() {
                    InstallStrategy::Package(_) => target.acquire(cx)?,
                    InstallStrategy::Clone(_) => target.work_dir(self.run),
                };
                info!(target = %target.name(), "Running tests: {}", target.test_command());
                cx.environments
                    .run_tests(&env, target.test_command(), &dir)?;
                Ok(())
            }
        }
    }
}
