//! Pallet resolution engine
//!
//! Decides which packages must be present, in what versions and in what
//! order, before a package is materialized onto a filesystem:
//! version and constraint semantics, dependency-graph resolution, and
//! conflict and virtual-package handling against the installed set.

pub mod batches;
pub mod catalog;
pub mod constraint;
pub mod installed;
pub mod manifest;
pub mod resolver;
pub mod validator;
pub mod version;

pub use batches::{BatchError, InstallBatches};
pub use catalog::{Catalog, Published, Repository, RepositorySet};
pub use constraint::{highest_satisfying, Constraint, Op};
pub use installed::{InstalledDb, InstalledRecord, InstalledState};
pub use manifest::{Dependency, DependencyKind, Manifest, OptionValue};
pub use resolver::{
    Conflict, ConflictAction, ConflictChecker, ConflictReason, Plan, PlannedPackage,
    ProviderIndex, ResolveOptions, Resolver,
};
pub use validator::{ValidationError, Validator};
pub use version::{Identifier, Version};

/// Resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Malformed version: '{0}'")]
    MalformedVersion(String),

    #[error("Invalid constraint '{text}': {reason}")]
    InvalidConstraint { text: String, reason: String },

    #[error("Invalid dependency '{text}': {reason}")]
    InvalidDependency { text: String, reason: String },

    #[error("No version of '{package}' satisfies {constraint} (required by {required_by})")]
    UnsatisfiableConstraint {
        package: String,
        constraint: String,
        required_by: String,
    },

    #[error("Installed {package} {installed} does not satisfy {constraint} (required by {required_by})")]
    InstalledVersionMismatch {
        package: String,
        installed: String,
        constraint: String,
        required_by: String,
    },

    #[error("Package '{package}' is masked{}", .repository.as_ref().map(|r| format!(" in repository '{}'", r)).unwrap_or_default())]
    PackageMasked {
        package: String,
        repository: Option<String>,
    },

    #[error("Pinned version {version} of '{package}' is not available")]
    PinnedVersionUnavailable { package: String, version: String },

    #[error("Unresolvable conflict installing '{package}': {}", resolver::conflict::summary(.conflicts))]
    UnresolvableConflict {
        package: String,
        conflicts: Vec<Conflict>,
    },

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Invalid manifest for '{package}': {reason}")]
    ManifestInvalid { package: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse record: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] pallet_config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
