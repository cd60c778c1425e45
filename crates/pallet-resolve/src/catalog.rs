//! Repository catalog
//!
//! Repositories publish manifests; the catalog aggregates them into one
//! multi-source view. Iteration order is stable: priority descending, then
//! repository name, then manifest file order within a repository.

use crate::manifest::Manifest;
use crate::validator::Validator;
use crate::version::Version;
use crate::{ResolveError, Result};
use pallet_config::{Config, RepoKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One published version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub repository: String,
    pub version: Version,
}

impl AsRef<Version> for Published {
    fn as_ref(&self) -> &Version {
        &self.version
    }
}

/// Source of manifests for resolution
pub trait Catalog {
    /// Every manifest of every repository, as `(repository, manifest)`, in
    /// stable catalog order
    fn manifests(&self) -> Box<dyn Iterator<Item = (&str, &Manifest)> + '_>;

    /// All published versions of `name` across repositories, in catalog order
    fn available_versions(&self, name: &str) -> Vec<Published> {
        self.manifests()
            .filter(|(_, m)| m.name == name)
            .map(|(repo, m)| Published {
                repository: repo.to_string(),
                version: m.version.clone(),
            })
            .collect()
    }

    /// Manifest of `name` at `version`, from `repository` when given, else
    /// from the first repository publishing it
    fn load(&self, name: &str, version: &Version, repository: Option<&str>) -> Result<Manifest> {
        self.manifests()
            .find(|(repo, m)| {
                m.name == name && m.version == *version && repository.map_or(true, |r| r == *repo)
            })
            .map(|(_, m)| m.clone())
            .ok_or_else(|| ResolveError::NotFound(format!("{} {}", name, version)))
    }

    /// Whether any repository publishes a manifest named `name`
    fn contains(&self, name: &str) -> bool {
        self.manifests().any(|(_, m)| m.name == name)
    }
}

/// A single repository of manifests
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub location: PathBuf,
    pub kind: RepoKind,
    pub priority: i32,
    manifests: Vec<Manifest>,
}

impl Repository {
    pub fn new(name: impl Into<String>, kind: RepoKind, priority: i32) -> Self {
        Self {
            name: name.into(),
            location: PathBuf::new(),
            kind,
            priority,
            manifests: Vec::new(),
        }
    }

    /// Load every `*.toml` manifest below `dir`, in file-name order
    ///
    /// Manifests that fail to parse or validate are skipped and logged.
    pub fn load_dir(name: impl Into<String>, dir: &Path, kind: RepoKind, priority: i32) -> Result<Self> {
        let mut repo = Self::new(name, kind, priority);
        repo.location = dir.to_path_buf();

        if !dir.is_dir() {
            return Err(ResolveError::NotFound(format!(
                "repository '{}' at {}",
                repo.name,
                dir.display()
            )));
        }

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| ResolveError::Io(e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "toml") {
                continue;
            }

            let manifest = match Manifest::from_file(path) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(repository = %repo.name, path = %path.display(), error = %e, "skipping unreadable manifest");
                    continue;
                }
            };

            if let Err(errors) = Validator::validate(&manifest) {
                for error in errors {
                    warn!(repository = %repo.name, package = %manifest.name, %error, "skipping invalid manifest");
                }
                continue;
            }
            for lint in Validator::lint(&manifest) {
                warn!(repository = %repo.name, package = %manifest.name, %lint, "manifest lint");
            }

            repo.manifests.push(manifest);
        }

        debug!(repository = %repo.name, manifests = repo.manifests.len(), "loaded repository");
        Ok(repo)
    }

    pub fn add_manifest(&mut self, manifest: Manifest) {
        self.manifests.push(manifest);
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.add_manifest(manifest);
        self
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

/// All configured repositories, kept in catalog order
#[derive(Debug, Clone, Default)]
pub struct RepositorySet {
    repositories: Vec<Repository>,
}

impl RepositorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every repository named in `config`
    ///
    /// VCS repositories are read from their local checkout.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut set = Self::new();
        for (name, entry) in config.repositories.ordered() {
            let dir = config.manifest_dir(name, entry);
            let repo = Repository::load_dir(name, &dir, entry.kind(), entry.priority())?;
            set.add(repo);
        }
        Ok(set)
    }

    /// Add a repository, keeping catalog order
    pub fn add(&mut self, repository: Repository) {
        self.repositories.push(repository);
        self.repositories
            .sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.add(repository);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }
}

impl Catalog for RepositorySet {
    fn manifests(&self) -> Box<dyn Iterator<Item = (&str, &Manifest)> + '_> {
        Box::new(
            self.repositories
                .iter()
                .flat_map(|repo| repo.manifests.iter().map(move |m| (repo.name.as_str(), m))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manifest(name: &str, version: &str) -> Manifest {
        Manifest::new(name, Version::parse(version).unwrap())
    }

    fn catalog() -> RepositorySet {
        RepositorySet::new()
            .with_repository(
                Repository::new("extra", RepoKind::Local, 0)
                    .with_manifest(manifest("zlib", "1.3.0"))
                    .with_manifest(manifest("curl", "8.5.0")),
            )
            .with_repository(
                Repository::new("core", RepoKind::Local, 10)
                    .with_manifest(manifest("zlib", "1.2.13"))
                    .with_manifest(manifest("zlib", "1.3.0")),
            )
    }

    #[test]
    fn test_catalog_order_is_priority_then_name() {
        let catalog = catalog();
        let names: Vec<&str> = catalog.repositories().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["core", "extra"]);
    }

    #[test]
    fn test_available_versions_across_repositories() {
        let versions = catalog().available_versions("zlib");
        let rendered: Vec<String> = versions
            .iter()
            .map(|p| format!("{}:{}", p.repository, p.version))
            .collect();
        assert_eq!(rendered, vec!["core:1.2.13", "core:1.3.0", "extra:1.3.0"]);
    }

    #[test]
    fn test_load_prefers_requested_repository() {
        let catalog = catalog();
        let version = Version::new(1, 3, 0);
        assert!(catalog.load("zlib", &version, Some("extra")).is_ok());
        assert!(catalog.load("curl", &version, None).is_err());
        assert!(matches!(
            catalog.load("zlib", &Version::new(9, 0, 0), None),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_contains() {
        let catalog = catalog();
        assert!(catalog.contains("curl"));
        assert!(!catalog.contains("webserver"));
    }
}
