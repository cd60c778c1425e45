//! Package manifest validation

use crate::manifest::{DependencyKind, Manifest};
use std::collections::HashSet;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid package name format
    InvalidPackageName(String),
    /// Invalid dependency specification
    InvalidDependency { name: String, reason: String },
    /// Package depends on itself
    SelfDependency(String),
    /// Package conflicts with or replaces itself
    SelfConflict { name: String, field: &'static str },
    /// Same dependency declared under several kinds (last kind wins)
    DuplicateDependency {
        name: String,
        kinds: Vec<DependencyKind>,
    },
    /// Package lists its own name as a capability
    ProvidesSelf(String),
    /// Owned file path outside the package's root
    InvalidFile { path: String, reason: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidPackageName(name) => {
                write!(f, "Invalid package name: {}", name)
            }
            ValidationError::InvalidDependency { name, reason } => {
                write!(f, "Invalid dependency '{}': {}", name, reason)
            }
            ValidationError::SelfDependency(name) => {
                write!(f, "Package '{}' depends on itself", name)
            }
            ValidationError::SelfConflict { name, field } => {
                write!(f, "Package '{}' lists itself in {}", name, field)
            }
            ValidationError::DuplicateDependency { name, kinds } => {
                let kinds: Vec<String> = kinds.iter().map(|k| k.field().to_string()).collect();
                write!(
                    f,
                    "Dependency '{}' declared in {}; the last one wins",
                    name,
                    kinds.join(", ")
                )
            }
            ValidationError::ProvidesSelf(name) => {
                write!(f, "Package '{}' provides its own name", name)
            }
            ValidationError::InvalidFile { path, reason } => {
                write!(f, "Invalid file '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Package manifest validator
pub struct Validator;

impl Validator {
    /// Hard errors that make a manifest unusable for resolution
    pub fn validate(manifest: &Manifest) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_package_name(&manifest.name) {
            errors.push(e);
        }

        errors.extend(Self::validate_dependencies(manifest));
        errors.extend(Self::validate_relations(manifest));
        errors.extend(Self::validate_files(manifest));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Suspicious but resolvable manifest contents
    pub fn lint(manifest: &Manifest) -> Vec<ValidationError> {
        let mut lints: Vec<ValidationError> = manifest
            .dependency_collisions()
            .into_iter()
            .map(|(name, kinds)| ValidationError::DuplicateDependency { name, kinds })
            .collect();

        if manifest.provides_capability(&manifest.name) {
            lints.push(ValidationError::ProvidesSelf(manifest.name.clone()));
        }

        lints
    }

    /// Validate package name format
    pub fn validate_package_name(name: &str) -> Result<(), ValidationError> {
        let Some(first) = name.chars().next() else {
            return Err(ValidationError::InvalidPackageName(
                "Package name cannot be empty".to_string(),
            ));
        };

        // Package names must start with lowercase letter or digit
        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' must start with lowercase letter or digit",
                name
            )));
        }

        // Lowercase letters, digits, and - _ . + only
        if !name.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | '+')
        }) {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' contains invalid characters (only lowercase, digits, -, _, ., + allowed)",
                name
            )));
        }

        if name.ends_with(['-', '_', '.']) {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' cannot end with -, _ or .",
                name
            )));
        }

        // Length limits
        if name.len() > 64 {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' exceeds maximum length of 64 characters",
                name
            )));
        }

        Ok(())
    }

    /// Validate dependency names across all three kinds
    fn validate_dependencies(manifest: &Manifest) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut reported_self = false;

        for dep in manifest
            .depends
            .iter()
            .chain(&manifest.build_depends)
            .chain(&manifest.optional_depends)
        {
            if let Err(e) = Self::validate_package_name(&dep.name) {
                errors.push(ValidationError::InvalidDependency {
                    name: dep.name.clone(),
                    reason: e.to_string(),
                });
            }

            if dep.name == manifest.name && !reported_self {
                errors.push(ValidationError::SelfDependency(manifest.name.clone()));
                reported_self = true;
            }
        }

        errors
    }

    /// Validate conflicts, replaces and provides entries
    fn validate_relations(manifest: &Manifest) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, names) in [
            ("conflicts", &manifest.conflicts),
            ("replaces", &manifest.replaces),
            ("provides", &manifest.provides),
        ] {
            let mut seen = HashSet::new();
            for name in names {
                if let Err(e) = Self::validate_package_name(name) {
                    errors.push(ValidationError::InvalidDependency {
                        name: name.clone(),
                        reason: format!("in {}: {}", field, e),
                    });
                }
                if field != "provides" && *name == manifest.name && seen.insert(name) {
                    errors.push(ValidationError::SelfConflict {
                        name: manifest.name.clone(),
                        field,
                    });
                }
            }
        }

        errors
    }

    /// Owned files must be relative paths that stay inside the target root
    fn validate_files(manifest: &Manifest) -> Vec<ValidationError> {
        manifest
            .files
            .iter()
            .filter_map(|path| {
                let reason = if path.is_absolute() {
                    "must be relative to the target root"
                } else if path
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
                {
                    "must not contain '..'"
                } else {
                    return None;
                };
                Some(ValidationError::InvalidFile {
                    path: path.display().to_string(),
                    reason: reason.to_string(),
                })
            })
            .collect()
    }
}
