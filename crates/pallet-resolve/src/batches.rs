//! Install batches computed from a plan
//!
//! A plan is already a valid install order. Batches group its steps so that
//! every package in a batch depends only on packages of earlier batches;
//! packages within one batch can be materialized concurrently.

use crate::resolver::Plan;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BatchError {
    #[error("Circular dependency detected among: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
}

pub type BatchResult<T> = Result<T, BatchError>;

/// Install ordering over the packages of one plan
pub struct InstallBatches {
    /// Package -> dependencies that are themselves part of the plan
    graph: BTreeMap<String, Vec<String>>,
}

impl InstallBatches {
    /// Build from a plan, ignoring dependencies that are not planned
    /// (already installed and satisfying)
    pub fn new(plan: &Plan) -> Self {
        let planned: BTreeSet<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        let graph = plan
            .steps
            .iter()
            .map(|step| {
                let deps = step
                    .dependencies
                    .iter()
                    .filter(|d| planned.contains(d.as_str()))
                    .cloned()
                    .collect();
                (step.name.clone(), deps)
            })
            .collect();
        Self { graph }
    }

    /// Create from a raw dependency graph
    pub fn from_graph(graph: BTreeMap<String, Vec<String>>) -> Self {
        Self { graph }
    }

    /// Groups of packages that can be installed in parallel, in order
    pub fn batches(&self) -> BatchResult<Vec<Vec<String>>> {
        let mut groups = Vec::new();
        let mut installed: BTreeSet<&str> = BTreeSet::new();

        loop {
            // BTreeMap iteration keeps each group sorted
            let group: Vec<&str> = self
                .graph
                .iter()
                .filter(|(package, _)| !installed.contains(package.as_str()))
                .filter(|(_, deps)| deps.iter().all(|d| installed.contains(d.as_str())))
                .map(|(package, _)| package.as_str())
                .collect();

            if group.is_empty() {
                break;
            }

            installed.extend(group.iter().copied());
            groups.push(group.into_iter().map(str::to_string).collect());
        }

        if installed.len() != self.graph.len() {
            return Err(self.cycle_error(installed));
        }

        Ok(groups)
    }

    pub fn dependencies(&self, package: &str) -> Option<&[String]> {
        self.graph.get(package).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    fn cycle_error(&self, done: BTreeSet<&str>) -> BatchError {
        BatchError::CircularDependency(
            self.graph
                .keys()
                .filter(|p| !done.contains(p.as_str()))
                .cloned()
                .collect(),
        )
    }
}
