//! Repository list (~/.pallet/repos.toml)
//!
//! Each repository is either a legacy bare location or a detailed table:
//!
//! ```toml
//! [repositories]
//! core = "/srv/pallet/core"
//! extra = { location = "https://example.org/extra.git", kind = "vcs", priority = 10 }
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Repository configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RepositoriesConfig {
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

/// Where a repository's manifests come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    /// Manifests are read straight from `location`
    #[default]
    Local,
    /// `location` is a remote; manifests are read from its local checkout
    Vcs,
}

/// A single repository entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RepositoryEntry {
    /// Legacy format: bare location, local, priority 0
    Location(String),

    /// Detailed repository entry
    Detailed {
        location: String,
        #[serde(default)]
        kind: RepoKind,
        #[serde(default)]
        priority: i32,
    },
}

impl RepositoryEntry {
    pub fn location(&self) -> &str {
        match self {
            RepositoryEntry::Location(location) => location,
            RepositoryEntry::Detailed { location, .. } => location,
        }
    }

    pub fn kind(&self) -> RepoKind {
        match self {
            RepositoryEntry::Location(_) => RepoKind::Local,
            RepositoryEntry::Detailed { kind, .. } => *kind,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            RepositoryEntry::Location(_) => 0,
            RepositoryEntry::Detailed { priority, .. } => *priority,
        }
    }
}

impl RepositoriesConfig {
    /// Load repository list from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config: Self = crate::read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the repository list back to disk
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        crate::write_toml(path, self)
    }

    /// Validate repository names and locations
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, entry) in &self.repositories {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "repository name cannot be empty".to_string(),
                ));
            }
            if entry.location().trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("repositories.{}.location", name),
                    reason: "location cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Add a repository, refusing to shadow an existing name
    pub fn add(&mut self, name: &str, entry: RepositoryEntry) -> ConfigResult<()> {
        if self.repositories.contains_key(name) {
            return Err(ConfigError::DuplicateRepository(name.to_string()));
        }
        self.repositories.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<RepositoryEntry> {
        self.repositories.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.get(name)
    }

    /// Repositories in catalog order: priority descending, then name
    pub fn ordered(&self) -> Vec<(&str, &RepositoryEntry)> {
        let mut entries: Vec<(&str, &RepositoryEntry)> = self
            .repositories
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        entries.sort_by(|a, b| b.1.priority().cmp(&a.1.priority()).then(a.0.cmp(b.0)));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
