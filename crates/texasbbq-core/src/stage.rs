//! Stage definitions and canonical ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stages, declared in canonical execution order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Ensure the private Miniconda installation exists.
    Miniconda,

    /// Create or reuse each target's environment and install its dependencies.
    Environment,

    /// Install the source project into each target's environment.
    InstallSource,

    /// Install each target project into its own environment.
    InstallTarget,

    /// Run each target's test command.
    Tests,
}

impl Stage {
    /// All stages in canonical order.
    pub const ALL: [Stage; 5] = [
        Stage::Miniconda,
        Stage::Environment,
        Stage::InstallSource,
        Stage::InstallTarget,
        Stage::Tests,
    ];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Miniconda => "miniconda",
            Stage::Environment => "environment",
            Stage::InstallSource => "install_source",
            Stage::InstallTarget => "install_target",
            Stage::Tests => "tests",
        }
    }

    /// Whether the stage runs once per run rather than once per target.
    pub fn is_global(&self) -> bool {
        matches!(self, Stage::Miniconda)
    }

    /// Reduce `requested` to the canonical subsequence of [`Stage::ALL`].
    ///
    /// The order of `requested` is irrelevant and duplicates collapse.
    pub fn canonical<I>(requested: I) -> Vec<Stage>
    where
        I: IntoIterator<Item = Stage>,
    {
        let requested: Vec<Stage> = requested.into_iter().collect();
        Stage::ALL
            .into_iter()
            .filter(|stage| requested.contains(stage))
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stage name that is not one of [`Stage::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}' (expected one of: miniconda, environment, install_source, install_target, tests)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == wanted)
            .ok_or_else(|| UnknownStage(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Miniconda.name(), "miniconda");
        assert_eq!(Stage::Environment.name(), "environment");
        assert_eq!(Stage::InstallSource.name(), "install_source");
        assert_eq!(Stage::InstallTarget.name(), "install_target");
        assert_eq!(Stage::Tests.name(), "tests");
    }

    #[test]
    fn test_parse_roundtrips_names() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = "clone".parse::<Stage>().unwrap_err();
        assert_eq!(err, UnknownStage("clone".to_string()));
        assert!(err.to_string().contains("install_target"));
    }

    #[test]
    fn test_canonical_ignores_requested_order() {
        let stages = Stage::canonical([Stage::Tests, Stage::Miniconda]);
        assert_eq!(stages, vec![Stage::Miniconda, Stage::Tests]);
    }

    #[test]
    fn test_canonical_every_permutation() {
        let subset = [Stage::Tests, Stage::InstallSource, Stage::Miniconda];
        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for p in permutations {
            let requested = p.iter().map(|&i| subset[i]);
            assert_eq!(
                Stage::canonical(requested),
                vec![Stage::Miniconda, Stage::InstallSource, Stage::Tests]
            );
        }
    }

    #[test]
    fn test_canonical_collapses_duplicates() {
        let stages = Stage::canonical([Stage::Tests, Stage::Tests, Stage::Environment]);
        assert_eq!(stages, vec![Stage::Environment, Stage::Tests]);
    }

    #[test]
    fn test_only_miniconda_is_global() {
        assert!(Stage::Miniconda.is_global());
        assert!(Stage::ALL[1..].iter().all(|s| !s.is_global()));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Stage::InstallSource).unwrap();
        assert_eq!(json, "\"install_source\"");
    }
}
