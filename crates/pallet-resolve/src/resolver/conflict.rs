//! Conflict detection and resolution against the installed set and within
//! a plan

use crate::installed::InstalledState;
use crate::manifest::Manifest;
use crate::{ResolveError, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Why a candidate collides with an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// Named in the candidate's `conflicts`
    Explicit,
    /// Named in the candidate's `replaces`
    Replaces,
    /// Both packages own the same path
    FileOverlap { path: PathBuf },
}

/// What has to happen before the candidate can be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// The installed package must be removed, which needs force
    RequiresRemoval,
    /// The installed package is superseded and removed, which needs force
    RemoveThenContinue,
    /// Reported only
    Flag,
    /// Both packages are planned; no removal clears it
    Unresolvable,
}

/// Collision between an install candidate and an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Package the candidate collides with, installed or planned
    pub package: String,
    /// Package being installed
    pub candidate: String,
    pub reason: ConflictReason,
    pub action: ConflictAction,
}

impl Conflict {
    pub fn new(candidate: impl Into<String>, package: impl Into<String>, reason: ConflictReason) -> Self {
        let action = match reason {
            ConflictReason::Explicit => ConflictAction::RequiresRemoval,
            ConflictReason::Replaces => ConflictAction::RemoveThenContinue,
            ConflictReason::FileOverlap { .. } => ConflictAction::Flag,
        };
        Self {
            package: package.into(),
            candidate: candidate.into(),
            reason,
            action,
        }
    }

    /// Collision between two packages of the same plan
    pub fn planned(candidate: impl Into<String>, package: impl Into<String>, reason: ConflictReason) -> Self {
        Self {
            action: ConflictAction::Unresolvable,
            ..Self::new(candidate, package, reason)
        }
    }

    /// Whether this conflict stops an install
    pub fn is_blocking(&self) -> bool {
        self.action != ConflictAction::Flag
    }

    /// Whether uninstalling `package` clears this conflict
    pub fn needs_removal(&self) -> bool {
        matches!(
            self.action,
            ConflictAction::RequiresRemoval | ConflictAction::RemoveThenContinue
        )
    }

    /// Generate human-readable conflict report
    pub fn report(&self) -> String {
        let mut lines = vec![format!("Conflict installing '{}':", self.candidate)];
        let state = if self.action == ConflictAction::Unresolvable {
            "planned"
        } else {
            "installed"
        };

        lines.push(match &self.reason {
            ConflictReason::Explicit => {
                format!("  {} package '{}' is listed in conflicts", state, self.package)
            }
            ConflictReason::Replaces => {
                format!("  {} package '{}' is listed in replaces", state, self.package)
            }
            ConflictReason::FileOverlap { path } => format!(
                "  {} package '{}' already owns '{}'",
                state,
                self.package,
                path.display()
            ),
        });

        lines.push(match self.action {
            ConflictAction::RequiresRemoval => {
                format!("  action: remove '{}' (requires force)", self.package)
            }
            ConflictAction::RemoveThenContinue => format!(
                "  action: remove '{}' and continue (requires force)",
                self.package
            ),
            ConflictAction::Flag => "  action: none, the file will be overwritten".to_string(),
            ConflictAction::Unresolvable => {
                "  action: none possible, both packages are planned".to_string()
            }
        });

        lines.join("\n")
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ConflictReason::Explicit => write!(f, "{} conflicts with {}", self.candidate, self.package),
            ConflictReason::Replaces => write!(f, "{} replaces {}", self.candidate, self.package),
            ConflictReason::FileOverlap { path } => write!(
                f,
                "{} and {} both own {}",
                self.candidate,
                self.package,
                path.display()
            ),
        }
    }
}

/// One-line summary of a conflict set
pub fn summary(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(Conflict::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Installed packages that must go before the conflicts are cleared, in
/// first-seen order
pub fn blocking_packages(conflicts: &[Conflict]) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    for conflict in conflicts.iter().filter(|c| c.needs_removal()) {
        if !packages.contains(&conflict.package) {
            packages.push(conflict.package.clone());
        }
    }
    packages
}

/// Conflict detector and resolver
pub struct ConflictChecker;

impl ConflictChecker {
    /// Every collision between `manifest` and the installed set
    ///
    /// An installed package named `candidate` (a reinstall or upgrade of the
    /// candidate itself) is never reported.
    pub fn check_conflicts<S: InstalledState + ?Sized>(
        installed: &S,
        candidate: &str,
        manifest: &Manifest,
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for name in &manifest.conflicts {
            if name != candidate && installed.is_installed(name) {
                conflicts.push(Conflict::new(candidate, name, ConflictReason::Explicit));
            }
        }

        for name in &manifest.replaces {
            if name != candidate && installed.is_installed(name) {
                conflicts.push(Conflict::new(candidate, name, ConflictReason::Replaces));
            }
        }

        if !manifest.files.is_empty() {
            for owner in installed.names() {
                if owner == candidate {
                    continue;
                }
                for path in installed.owned_files(&owner) {
                    if manifest.files.contains(path) {
                        conflicts.push(Conflict::new(
                            candidate,
                            owner.clone(),
                            ConflictReason::FileOverlap { path: path.clone() },
                        ));
                    }
                }
            }
        }

        conflicts
    }

    /// Collisions between packages of the same plan
    ///
    /// Each manifest's `conflicts` and `replaces` are matched against the
    /// other planned names.
    pub fn check_planned(manifests: &[Manifest]) -> Vec<Conflict> {
        let planned: HashSet<&str> = manifests.iter().map(|m| m.name.as_str()).collect();
        let mut conflicts = Vec::new();

        for manifest in manifests {
            let declared = manifest
                .conflicts
                .iter()
                .map(|name| (name, ConflictReason::Explicit))
                .chain(manifest.replaces.iter().map(|name| (name, ConflictReason::Replaces)));
            for (name, reason) in declared {
                if *name != manifest.name && planned.contains(name.as_str()) {
                    conflicts.push(Conflict::planned(&manifest.name, name, reason));
                }
            }
        }

        conflicts
    }

    /// Clear blocking conflicts
    ///
    /// With `force`, every package to remove is uninstalled and `true` is
    /// returned; a failed removal is an `UnresolvableConflict`. Without
    /// `force`, installed state is left alone and the result is whether
    /// nothing blocks. File overlaps never block. A conflict between two
    /// planned packages always blocks, and then nothing is removed.
    pub fn resolve_conflicts<S: InstalledState + ?Sized>(
        installed: &mut S,
        conflicts: &[Conflict],
        force: bool,
    ) -> Result<bool> {
        for conflict in conflicts.iter().filter(|c| !c.is_blocking()) {
            warn!(conflict = %conflict, "file overlap");
        }
        if let Some(conflict) = conflicts
            .iter()
            .find(|c| c.action == ConflictAction::Unresolvable)
        {
            warn!(conflict = %conflict, "conflict within the plan");
            return Ok(false);
        }

        let blocking = blocking_packages(conflicts);
        if blocking.is_empty() {
            return Ok(true);
        }
        if !force {
            return Ok(false);
        }

        for package in &blocking {
            if let Err(e) = installed.remove(package) {
                warn!(package = %package, error = %e, "conflict removal failed");
                let candidate = conflicts
                    .iter()
                    .find(|c| c.package == *package)
                    .map(|c| c.candidate.clone())
                    .unwrap_or_default();
                return Err(ResolveError::UnresolvableConflict {
                    package: candidate,
                    conflicts: conflicts.to_vec(),
                });
            }
            info!(package = %package, "removed conflicting package");
        }

        Ok(true)
    }
}
