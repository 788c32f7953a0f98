//! Target discovery.
//!
//! Targets are registered explicitly: whatever list the caller hands over
//! (from the configuration file or built in code) is the whole namespace.

use crate::error::RunError;
use crate::project::{Installable, TargetProject};
use std::collections::HashSet;

/// Every target of a run, addressable by name, in declaration order.
pub struct TargetRegistry {
    targets: Vec<Box<dyn TargetProject>>,
}

impl TargetRegistry {
    /// Validate and register `targets`.
    ///
    /// Fails on the first invalid definition or on a name declared twice.
    pub fn discover<I>(targets: I) -> Result<Self, RunError>
    where
        I: IntoIterator<Item = Box<dyn TargetProject>>,
    {
        let mut seen = HashSet::new();
        let mut registered = Vec::new();
        for target in targets {
            target.validate()?;
            if !seen.insert(target.name().to_string()) {
                return Err(RunError::DuplicateTargetName(target.name().to_string()));
            }
            registered.push(target);
        }
        Ok(Self {
            targets: registered,
        })
    }

    pub fn get(&self, name: &str) -> Option<&dyn TargetProject> {
        self.targets
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TargetProject> {
        self.targets.iter().map(|t| t.as_ref())
    }

    /// Resolve a selection to target names in registry order.
    ///
    /// `None` selects everything. Unknown names fail with
    /// [`RunError::UnknownTarget`]; repeated names collapse.
    pub fn select(&self, requested: Option<&[String]>) -> Result<Vec<String>, RunError> {
        let Some(requested) = requested else {
            return Ok(self.names().into_iter().map(str::to_string).collect());
        };
        if let Some(unknown) = requested.iter().find(|name| self.get(name).is_none()) {
            return Err(RunError::UnknownTarget(unknown.clone()));
        }
        Ok(self
            .names()
            .into_iter()
            .filter(|name| requested.iter().any(|r| r.as_str() == *name))
            .map(str::to_string)
            .collect())
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.names())
            .finish()
    }
}
