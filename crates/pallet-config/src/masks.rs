//! Package masks (~/.pallet/masks.toml)
//!
//! ```toml
//! packages = ["broken-tool"]
//!
//! [repositories]
//! testing = ["openssl"]
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Administrative blocks on install candidates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Masks {
    /// Masked in every repository
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    packages: BTreeSet<String>,

    /// Masked only in the named repository
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    repositories: BTreeMap<String, BTreeSet<String>>,
}

impl Masks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load masks from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let masks: Self = crate::read_toml(path)?;
        masks.validate()?;
        Ok(masks)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        crate::write_toml(path, self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let global = self.packages.iter().map(|p| ("packages".to_string(), p));
        let scoped = self
            .repositories
            .iter()
            .flat_map(|(repo, names)| names.iter().map(move |p| (format!("repositories.{}", repo), p)));

        for (field, name) in global.chain(scoped) {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "masked package name cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether `name` is blocked, globally or in `repository`
    ///
    /// With `repository = None` only global masks are consulted.
    pub fn is_masked(&self, name: &str, repository: Option<&str>) -> bool {
        if self.packages.contains(name) {
            return true;
        }
        repository
            .and_then(|repo| self.repositories.get(repo))
            .is_some_and(|names| names.contains(name))
    }

    /// Mask `name` everywhere
    pub fn mask(&mut self, name: impl Into<String>) -> bool {
        self.packages.insert(name.into())
    }

    /// Mask `name` in one repository
    pub fn mask_in(&mut self, repository: impl Into<String>, name: impl Into<String>) -> bool {
        self.repositories
            .entry(repository.into())
            .or_default()
            .insert(name.into())
    }

    /// Remove global and per-repository masks for `name`
    pub fn unmask(&mut self, name: &str) -> bool {
        let mut removed = self.packages.remove(name);
        for names in self.repositories.values_mut() {
            removed |= names.remove(name);
        }
        self.repositories.retain(|_, names| !names.is_empty());
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.repositories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_masks() {
        let toml = r#"
packages = ["broken-tool"]

[repositories]
testing = ["openssl"]
"#;
        let masks: Masks = toml::from_str(toml).unwrap();
        assert!(masks.is_masked("broken-tool", None));
        assert!(masks.is_masked("broken-tool", Some("core")));
        assert!(masks.is_masked("openssl", Some("testing")));
        assert!(!masks.is_masked("openssl", Some("core")));
        assert!(!masks.is_masked("openssl", None));
    }

    #[test]
    fn test_mask_and_unmask() {
        let mut masks = Masks::new();
        assert!(masks.mask("foo"));
        assert!(masks.mask_in("testing", "foo"));
        assert!(masks.unmask("foo"));
        assert!(masks.is_empty());
        assert!(!masks.unmask("foo"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut masks = Masks::new();
        masks.mask_in("testing", "");
        assert!(masks.validate().is_err());
    }
}
