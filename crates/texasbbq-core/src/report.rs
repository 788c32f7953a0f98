//! Run results and the JSON run report.

use crate::error::TargetError;
use crate::stage::Stage;
use crate::EXIT_TARGETS_FAILED;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Outcome of one stage for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    /// Not attempted because an earlier stage of the same target failed.
    Skipped,
}

/// What went wrong, with the captured subprocess output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: String,
    pub message: String,
    pub exit_code: Option<i32>,
    pub output: String,
}

impl From<&TargetError> for FailureReport {
    fn from(err: &TargetError) -> Self {
        FailureReport {
            kind: err.kind().to_string(),
            message: err.to_string(),
            exit_code: err.exit_code(),
            output: err.captured_output().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    pub duration_ms: u64,
}

impl StageOutcome {
    pub fn passed(stage: Stage, duration_ms: u64) -> Self {
        StageOutcome {
            stage,
            status: StageStatus::Passed,
            failure: None,
            duration_ms,
        }
    }

    pub fn failed(stage: Stage, err: &TargetError, duration_ms: u64) -> Self {
        StageOutcome {
            stage,
            status: StageStatus::Failed,
            failure: Some(err.into()),
            duration_ms,
        }
    }

    pub fn skipped(stage: Stage) -> Self {
        StageOutcome {
            stage,
            status: StageStatus::Skipped,
            failure: None,
            duration_ms: 0,
        }
    }
}

/// Every stage outcome recorded for one target, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub name: String,
    pub stages: Vec<StageOutcome>,
}

impl TargetOutcome {
    pub fn new(name: &str) -> Self {
        TargetOutcome {
            name: name.to_string(),
            stages: Vec::new(),
        }
    }

    pub fn failed(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Failed)
    }

    /// The stage that failed, if any.
    pub fn failure(&self) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.status == StageStatus::Failed)
    }

    pub fn status_of(&self, stage: Stage) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.status)
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Stages that were requested, in canonical order.
    pub stages: Vec<Stage>,
    /// How the miniconda stage went, when it ran.
    pub bootstrap: Option<String>,
    pub targets: Vec<TargetOutcome>,
}

impl RunResult {
    /// An empty result with an entry for each of `targets`.
    pub fn new<'t, I>(stages: &[Stage], targets: I) -> Self
    where
        I: IntoIterator<Item = &'t str>,
    {
        RunResult {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            stages: stages.to_vec(),
            bootstrap: None,
            targets: targets.into_iter().map(TargetOutcome::new).collect(),
        }
    }

    /// Append `outcome` to the record of `target`.
    pub fn record(&mut self, target: &str, outcome: StageOutcome) {
        match self.targets.iter_mut().find(|t| t.name == target) {
            Some(entry) => entry.stages.push(outcome),
            None => {
                let mut entry = TargetOutcome::new(target);
                entry.stages.push(outcome);
                self.targets.push(entry);
            }
        }
    }

    pub fn target(&self, name: &str) -> Option<&TargetOutcome> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn has_failed(&self, target: &str) -> bool {
        self.target(target).is_some_and(TargetOutcome::failed)
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True only if every attempted (stage, target) combination passed.
    pub fn success(&self) -> bool {
        !self.targets.iter().any(TargetOutcome::failed)
    }

    pub fn failed_targets(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.failed())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn passed_targets(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| !t.failed())
            .map(|t| t.name.as_str())
            .collect()
    }

    /// The closing summary line, when something failed.
    pub fn summary(&self) -> Option<String> {
        let failed = self.failed_targets();
        if failed.is_empty() {
            None
        } else {
            Some(format!("The following tests failed: {}", failed.join(", ")))
        }
    }

    /// The summary line followed by each failed target's failing stage,
    /// error and captured output.
    pub fn failure_report(&self) -> Option<String> {
        let mut out = self.summary()?;
        for target in self.targets.iter() {
            let Some(stage) = target.failure() else {
                continue;
            };
            out.push_str(&format!("\n\n--- {} ({})", target.name, stage.stage));
            if let Some(failure) = &stage.failure {
                out.push_str(&format!(": {}", failure.message));
                if !failure.output.is_empty() {
                    out.push('\n');
                    out.push_str(failure.output.trim_end());
                }
            }
        }
        Some(out)
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            EXIT_TARGETS_FAILED
        }
    }

    /// Write the run report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("serialize run report")?;
        std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }
}
