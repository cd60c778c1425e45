//! Pallet Configuration System
//!
//! Provides configuration management for the pallet package manager:
//! - Global configuration (~/.pallet/config.toml)
//! - Repository list (~/.pallet/repos.toml)
//! - Version pins (~/.pallet/pins.toml)
//! - Package masks (~/.pallet/masks.toml)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Files in the config directory (~/.pallet, or PALLET_CONFIG_DIR)
//! 3. Environment variables (PALLET_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use pallet_config::ConfigLoader;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load().unwrap();
//! println!("installing into {}", config.root().display());
//! ```

pub mod global;
pub mod loader;
pub mod masks;
pub mod pins;
pub mod repos;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate repository: {0}")]
    DuplicateRepository(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read a TOML file into `T`, mapping a missing file to [`ConfigError::NotFound`]
pub(crate) fn read_toml<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::IoError(e)
        }
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
        file: path.to_path_buf(),
        error: e,
    })
}

/// Serialize `value` and replace `path` with it in one rename
pub(crate) fn write_toml<T: serde::Serialize>(path: &std::path::Path, value: &T) -> ConfigResult<()> {
    let content = toml::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use masks::Masks;
pub use pins::Pins;
pub use repos::{RepoKind, RepositoriesConfig, RepositoryEntry};
