//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::{GlobalConfig, PathsConfig, ResolveConfig};
use crate::masks::Masks;
use crate::pins::Pins;
use crate::repos::{RepoKind, RepositoriesConfig, RepositoryEntry};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const REPOS_FILE: &str = "repos.toml";
pub const PINS_FILE: &str = "pins.toml";
pub const MASKS_FILE: &str = "masks.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Files in the config directory - override defaults
/// 3. Environment variables (PALLET_*) - override files
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached config directory
    config_dir: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,

    pub repositories: RepositoriesConfig,

    pub pins: Pins,

    pub masks: Masks,

    /// Directory the configuration was loaded from
    pub config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_dir: None }
    }

    /// Load configuration from PALLET_CONFIG_DIR, or ~/.pallet
    pub fn load(&mut self) -> ConfigResult<Config> {
        let dir = self.config_dir()?;
        self.load_from_directory(&dir)
    }

    /// Load configuration from the given config directory
    ///
    /// Every file is optional; a missing file contributes its defaults.
    pub fn load_from_directory(&mut self, dir: &Path) -> ConfigResult<Config> {
        let global = optional(GlobalConfig::load_from_file(&dir.join(CONFIG_FILE)))?;
        let repositories = optional(RepositoriesConfig::load_from_file(&dir.join(REPOS_FILE)))?;
        let pins = optional(Pins::load_from_file(&dir.join(PINS_FILE)))?;
        let masks = optional(Masks::load_from_file(&dir.join(MASKS_FILE)))?;

        let global = self.apply_env_overrides(global)?;

        self.config_dir = Some(dir.to_path_buf());

        Ok(Config {
            global,
            repositories,
            pins,
            masks,
            config_dir: dir.to_path_buf(),
        })
    }

    fn config_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.config_dir {
            return Ok(dir.clone());
        }
        match env::var_os("PALLET_CONFIG_DIR") {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => GlobalConfig::default_config_dir(),
        }
    }

    /// Apply environment variable overrides to the global config
    ///
    /// Recognized: PALLET_ROOT, PALLET_STATE_DIR, PALLET_OPTIONAL
    fn apply_env_overrides(&self, mut config: GlobalConfig) -> ConfigResult<GlobalConfig> {
        if let Ok(root) = env::var("PALLET_ROOT") {
            config
                .paths
                .get_or_insert_with(PathsConfig::default)
                .root = Some(PathBuf::from(root));
        }

        if let Ok(state) = env::var("PALLET_STATE_DIR") {
            config
                .paths
                .get_or_insert_with(PathsConfig::default)
                .state = Some(PathBuf::from(state));
        }

        if let Ok(optional) = env::var("PALLET_OPTIONAL") {
            let optional_bool = matches!(optional.to_lowercase().as_str(), "true" | "1" | "yes");
            config
                .resolve
                .get_or_insert_with(ResolveConfig::default)
                .optional = Some(optional_bool);
        }

        config.validate()?;
        Ok(config)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> ConfigResult<PathBuf> {
        let dir = self.config_dir()?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn optional<T: Default>(result: ConfigResult<T>) -> ConfigResult<T> {
    match result {
        Err(ConfigError::NotFound(_)) => Ok(T::default()),
        other => other,
    }
}

impl Config {
    /// Target filesystem root (default: "/")
    pub fn root(&self) -> &Path {
        self.global.root().unwrap_or_else(|| Path::new("/"))
    }

    /// State directory (default: <config_dir>/state)
    pub fn state_dir(&self) -> PathBuf {
        self.global
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_dir.join("state"))
    }

    /// Directory holding one installed record per package
    pub fn installed_dir(&self) -> PathBuf {
        self.state_dir().join("installed")
    }

    /// Local checkout of a VCS repository
    pub fn checkout_dir(&self, repository: &str) -> PathBuf {
        self.state_dir().join("repos").join(repository)
    }

    /// Directory manifests of `repository` are read from
    pub fn manifest_dir(&self, repository: &str, entry: &RepositoryEntry) -> PathBuf {
        match entry.kind() {
            RepoKind::Local => PathBuf::from(entry.location()),
            RepoKind::Vcs => self.checkout_dir(repository),
        }
    }

    pub fn pins_path(&self) -> PathBuf {
        self.config_dir.join(PINS_FILE)
    }

    pub fn masks_path(&self) -> PathBuf {
        self.config_dir.join(MASKS_FILE)
    }

    pub fn repos_path(&self) -> PathBuf {
        self.config_dir.join(REPOS_FILE)
    }

    /// Whether the optional pass runs by default
    pub fn resolve_optional(&self) -> bool {
        self.global.resolve_optional()
    }
}
