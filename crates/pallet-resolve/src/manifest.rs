//! Package manifest types
//!
//! Manifests are produced by the manifest loader and are immutable inputs to
//! resolution. The on-disk form is TOML:
//!
//! ```toml
//! name = "nginx"
//! version = "1.25.3"
//! depends = ["openssl>=3.0", "zlib"]
//! build_depends = ["cmake ^3.20"]
//! optional_depends = [{ name = "geoip", version = "~1.6" }]
//! provides = ["webserver"]
//! files = ["usr/bin/nginx"]
//!
//! [options]
//! ssl = true
//! ```

use crate::constraint::Constraint;
use crate::version::Version;
use crate::{ResolveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// How a dependency participates in resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Needed at run time
    Required,
    /// Needed only while building
    BuildOnly,
    /// Installed only by the optional pass
    Optional,
}

impl DependencyKind {
    /// Manifest key holding dependencies of this kind
    pub fn field(&self) -> &'static str {
        match self {
            DependencyKind::Required => "depends",
            DependencyKind::BuildOnly => "build_depends",
            DependencyKind::Optional => "optional_depends",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyKind::Required => "required",
            DependencyKind::BuildOnly => "build",
            DependencyKind::Optional => "optional",
        })
    }
}

/// Dependency specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub constraint: Constraint,
    pub kind: DependencyKind,
}

/// Characters that end a dependency name and start its constraint
const CONSTRAINT_START: [char; 9] = ['<', '>', '=', '!', '^', '~', '≠', '≤', '≥'];

impl Dependency {
    pub fn new(name: impl Into<String>, constraint: Constraint, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            constraint,
            kind,
        }
    }

    /// Parse `"name[ ]<constraint>"`, e.g. `"webserver>=1.0"` or `"python 3.*"`
    pub fn parse(text: &str, kind: DependencyKind) -> Result<Self> {
        let text = text.trim();
        let end = text
            .find(|c: char| c.is_whitespace() || CONSTRAINT_START.contains(&c))
            .unwrap_or(text.len());
        let (name, rest) = text.split_at(end);

        if name.is_empty() {
            return Err(ResolveError::InvalidDependency {
                text: text.to_string(),
                reason: "missing package name".to_string(),
            });
        }

        Ok(Self::new(name, Constraint::parse(rest)?, kind))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Constraint::Any => f.write_str(&self.name),
            Constraint::Pattern { .. } => write!(f, "{} {}", self.name, self.constraint),
            constraint => write!(f, "{}{}", self.name, constraint),
        }
    }
}

/// Build switch value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Number(i64),
    Value(String),
}

/// Package manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ManifestFile", into = "ManifestFile")]
pub struct Manifest {
    pub name: String,
    pub version: Version,
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub maintainer: Option<String>,
    pub depends: Vec<Dependency>,
    pub build_depends: Vec<Dependency>,
    pub optional_depends: Vec<Dependency>,
    /// Names that must not be installed alongside this package
    pub conflicts: Vec<String>,
    /// Names this package supersedes and removes
    pub replaces: Vec<String>,
    /// Virtual capability names this package satisfies
    pub provides: Vec<String>,
    /// Relative paths this package will own once installed
    pub files: Vec<PathBuf>,
    pub options: BTreeMap<String, OptionValue>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: None,
            license: None,
            homepage: None,
            maintainer: None,
            depends: Vec::new(),
            build_depends: Vec::new(),
            optional_depends: Vec::new(),
            conflicts: Vec::new(),
            replaces: Vec::new(),
            provides: Vec::new(),
            files: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    /// Parse manifest from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content).map_err(|e| ResolveError::ManifestInvalid {
            package: path.display().to_string(),
            reason: e.message().to_string(),
        })
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Append a dependency parsed from `spec` to the list for `kind`
    pub fn with_dependency(mut self, kind: DependencyKind, spec: &str) -> Result<Self> {
        let dep = Dependency::parse(spec, kind)?;
        self.dependencies_mut(kind).push(dep);
        Ok(self)
    }

    pub fn dependencies(&self, kind: DependencyKind) -> &[Dependency] {
        match kind {
            DependencyKind::Required => &self.depends,
            DependencyKind::BuildOnly => &self.build_depends,
            DependencyKind::Optional => &self.optional_depends,
        }
    }

    fn dependencies_mut(&mut self, kind: DependencyKind) -> &mut Vec<Dependency> {
        match kind {
            DependencyKind::Required => &mut self.depends,
            DependencyKind::BuildOnly => &mut self.build_depends,
            DependencyKind::Optional => &mut self.optional_depends,
        }
    }

    /// One dependency view keyed by name
    ///
    /// Lists merge in order `depends`, `build_depends`, `optional_depends`.
    /// A name seen again keeps its first position but takes the later
    /// entry's constraint and kind (last kind wins).
    pub fn merged_dependencies(&self) -> Vec<Dependency> {
        let mut merged: Vec<Dependency> = Vec::new();
        for dep in self
            .depends
            .iter()
            .chain(&self.build_depends)
            .chain(&self.optional_depends)
        {
            match merged.iter_mut().find(|d| d.name == dep.name) {
                Some(existing) => *existing = dep.clone(),
                None => merged.push(dep.clone()),
            }
        }
        merged
    }

    /// Dependency names declared under more than one kind, with every kind
    /// in declaration order
    pub fn dependency_collisions(&self) -> Vec<(String, Vec<DependencyKind>)> {
        let mut seen: Vec<(String, Vec<DependencyKind>)> = Vec::new();
        for dep in self
            .depends
            .iter()
            .chain(&self.build_depends)
            .chain(&self.optional_depends)
        {
            match seen.iter_mut().find(|(name, _)| *name == dep.name) {
                Some((_, kinds)) => kinds.push(dep.kind),
                None => seen.push((dep.name.clone(), vec![dep.kind])),
            }
        }
        seen.retain(|(_, kinds)| kinds.len() > 1);
        seen
    }

    pub fn provides_capability(&self, capability: &str) -> bool {
        self.provides.iter().any(|p| p == capability)
    }
}

/// On-disk manifest layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    name: String,
    version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends: Vec<DependencyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    build_depends: Vec<DependencyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    optional_depends: Vec<DependencyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    replaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    provides: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    options: BTreeMap<String, OptionValue>,
}

/// Dependency as written in a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DependencyEntry {
    /// `"name>=1.0"`
    Simple(String),
    /// `{ name = "name", version = ">=1.0" }`
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
}

impl DependencyEntry {
    fn into_dependency(self, kind: DependencyKind) -> Result<Dependency> {
        match self {
            DependencyEntry::Simple(text) => Dependency::parse(&text, kind),
            DependencyEntry::Detailed { name, version } => {
                let constraint = match version {
                    Some(v) => Constraint::parse(&v)?,
                    None => Constraint::Any,
                };
                Ok(Dependency::new(name, constraint, kind))
            }
        }
    }
}

fn convert_entries(entries: Vec<DependencyEntry>, kind: DependencyKind) -> Result<Vec<Dependency>> {
    entries
        .into_iter()
        .map(|entry| entry.into_dependency(kind))
        .collect()
}

impl TryFrom<ManifestFile> for Manifest {
    type Error = ResolveError;

    fn try_from(file: ManifestFile) -> Result<Self> {
        Ok(Self {
            depends: convert_entries(file.depends, DependencyKind::Required)?,
            build_depends: convert_entries(file.build_depends, DependencyKind::BuildOnly)?,
            optional_depends: convert_entries(file.optional_depends, DependencyKind::Optional)?,
            name: file.name,
            version: file.version,
            description: file.description,
            license: file.license,
            homepage: file.homepage,
            maintainer: file.maintainer,
            conflicts: file.conflicts,
            replaces: file.replaces,
            provides: file.provides,
            files: file.files,
            options: file.options,
        })
    }
}

impl From<Manifest> for ManifestFile {
    fn from(manifest: Manifest) -> Self {
        let entries = |deps: Vec<Dependency>| {
            deps.into_iter()
                .map(|d| DependencyEntry::Simple(d.to_string()))
                .collect()
        };
        Self {
            name: manifest.name,
            version: manifest.version,
            description: manifest.description,
            license: manifest.license,
            homepage: manifest.homepage,
            maintainer: manifest.maintainer,
            depends: entries(manifest.depends),
            build_depends: entries(manifest.build_depends),
            optional_depends: entries(manifest.optional_depends),
            conflicts: manifest.conflicts,
            replaces: manifest.replaces,
            provides: manifest.provides,
            files: manifest.files,
            options: manifest.options,
        }
    }
}
