//! Version pins (~/.pallet/pins.toml)
//!
//! A pin forces a package to one exact version whenever it is selected as an
//! install candidate. Pins are stored apart from installed state.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Pins {
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pins: BTreeMap<String, String>,
}

impl Pins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load pins from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let pins: Self = crate::read_toml(path)?;
        pins.validate()?;
        Ok(pins)
    }

    /// Persist pins, replacing the file atomically
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        crate::write_toml(path, self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, version) in &self.pins {
            if version.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("pins.{}", name),
                    reason: "pinned version cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Pinned version for `name`, if any
    pub fn pinned_version(&self, name: &str) -> Option<&str> {
        self.pins.get(name).map(String::as_str)
    }

    /// Pin `name` to `version`, returning the previous pin
    pub fn pin(&mut self, name: impl Into<String>, version: impl Into<String>) -> Option<String> {
        self.pins.insert(name.into(), version.into())
    }

    pub fn unpin(&mut self, name: &str) -> Option<String> {
        self.pins.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pins.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}
