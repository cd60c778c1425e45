//! Global Configuration (~/.pallet/config.toml)
//!
//! Handles user-level configuration stored in `~/.pallet/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global configuration from ~/.pallet/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Filesystem locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathsConfig>,

    /// Resolution defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveConfig>,
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Target filesystem root packages are materialized into (default: "/")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// State directory holding installed records and repository checkouts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PathBuf>,
}

/// Resolution defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Run the optional-dependency pass as part of every install
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config: Self = crate::read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(paths) = &self.paths {
            if let Some(root) = &paths.root {
                validate_path("paths.root", root)?;
            }
            if let Some(state) = &paths.state {
                validate_path("paths.state", state)?;
            }
        }

        Ok(())
    }

    /// Get the default config directory (~/.pallet)
    pub fn default_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".pallet"))
    }

    /// Configured target root, if any
    pub fn root(&self) -> Option<&Path> {
        self.paths.as_ref().and_then(|p| p.root.as_deref())
    }

    /// Configured state directory, if any
    pub fn state_dir(&self) -> Option<&Path> {
        self.paths.as_ref().and_then(|p| p.state.as_deref())
    }

    /// Whether optional dependencies are resolved by default
    pub fn resolve_optional(&self) -> bool {
        self.resolve
            .as_ref()
            .and_then(|r| r.optional)
            .unwrap_or(false)
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.paths.is_some() {
            self.paths = other.paths.clone();
        }
        if other.resolve.is_some() {
            self.resolve = other.resolve.clone();
        }
    }
}

/// Paths must be absolute so a resolution never depends on the working directory
fn validate_path(field: &str, path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "path cannot be empty".to_string(),
        });
    }
    if !path.is_absolute() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' must be an absolute path", path.display()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_global_config() {
        let toml = r#"
[resolve]
optional = true
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.resolve_optional());
        assert_eq!(config.root(), None);
    }

    #[test]
    fn test_parse_full_global_config() {
        let toml = r#"
[paths]
root = "/mnt/target"
state = "/var/lib/pallet"

[resolve]
optional = false
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.root(), Some(Path::new("/mnt/target")));
        assert_eq!(config.state_dir(), Some(Path::new("/var/lib/pallet")));
        assert!(!config.resolve_optional());
    }

    #[test]
    fn test_relative_root_rejected() {
        let config = GlobalConfig {
            paths: Some(PathsConfig {
                root: Some(PathBuf::from("relative/root")),
                state: None,
            }),
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "paths.root"
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[paths]
rooot = "/"
"#;
        assert!(toml::from_str::<GlobalConfig>(toml).is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = GlobalConfig::default();
        let override_config = GlobalConfig {
            resolve: Some(ResolveConfig {
                optional: Some(true),
            }),
            ..Default::default()
        };

        base.merge(&override_config);
        assert!(base.resolve_optional());
    }
}
