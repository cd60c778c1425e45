//! Ordered install plan

use super::conflict::Conflict;
use crate::batches::{BatchResult, InstallBatches};
use crate::manifest::DependencyKind;
use crate::version::Version;

/// One install decision
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPackage {
    pub name: String,
    pub version: Version,
    /// Repository the manifest came from; `None` for a caller-supplied root
    pub repository: Option<String>,
    /// How the package entered the plan
    pub kind: DependencyKind,
    /// Planned packages this one depends on
    pub dependencies: Vec<String>,
}

/// Result of a resolution call
///
/// `steps` is append-only and already in install order: every dependency
/// precedes its dependents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlannedPackage>,
    /// Packages uninstalled by a forced conflict resolution
    pub removed: Vec<String>,
    /// Every conflict found, blocking ones included once cleared
    pub conflicts: Vec<Conflict>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, package: PlannedPackage) {
        self.steps.push(package);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&PlannedPackage> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Index of `name` in install order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// `(name, version)` pairs in install order
    pub fn entries(&self) -> Vec<(&str, &Version)> {
        self.steps.iter().map(|s| (s.name.as_str(), &s.version)).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Groups that can be installed concurrently, in order
    pub fn batches(&self) -> BatchResult<Vec<Vec<String>>> {
        InstallBatches::new(self).batches()
    }
}
