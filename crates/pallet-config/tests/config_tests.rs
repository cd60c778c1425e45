//! Configuration loading and precedence tests

use pallet_config::{ConfigError, ConfigLoader, Masks, Pins, RepoKind, RepositoriesConfig, RepositoryEntry};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_state_dir() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "config.toml",
        r#"
[paths]
state = "/var/lib/pallet"
"#,
    );

    env::set_var("PALLET_STATE_DIR", "/tmp/pallet-state");

    let mut loader = ConfigLoader::new();
    let config = loader.load_from_directory(temp_dir.path()).unwrap();
    assert_eq!(config.state_dir(), Path::new("/tmp/pallet-state"));
    assert_eq!(config.installed_dir(), Path::new("/tmp/pallet-state/installed"));

    env::remove_var("PALLET_STATE_DIR");
}

#[test]
#[serial]
fn test_env_override_must_still_validate() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("PALLET_ROOT", "not/absolute");

    let mut loader = ConfigLoader::new();
    let result = loader.load_from_directory(temp_dir.path());
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

    env::remove_var("PALLET_ROOT");
}

#[test]
#[serial]
fn test_config_dir_from_env() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "pins.toml",
        r#"
[pins]
curl = "8.5.0"
"#,
    );

    env::set_var("PALLET_CONFIG_DIR", temp_dir.path());

    let mut loader = ConfigLoader::new();
    let config = loader.load().unwrap();
    assert_eq!(config.config_dir, temp_dir.path());
    assert_eq!(config.pins.pinned_version("curl"), Some("8.5.0"));

    env::remove_var("PALLET_CONFIG_DIR");
}

#[rstest]
#[case("true", true)]
#[case("1", true)]
#[case("YES", true)]
#[case("false", false)]
#[case("0", false)]
#[serial]
fn test_optional_env_values(#[case] value: &str, #[case] expected: bool) {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("PALLET_OPTIONAL", value);

    let mut loader = ConfigLoader::new();
    let config = loader.load_from_directory(temp_dir.path()).unwrap();
    assert_eq!(config.resolve_optional(), expected);

    env::remove_var("PALLET_OPTIONAL");
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[test]
#[serial]
fn test_pins_and_masks_written_through_config_paths() {
    let temp_dir = TempDir::new().unwrap();

    let mut loader = ConfigLoader::new();
    let mut config = loader.load_from_directory(temp_dir.path()).unwrap();

    config.pins.pin("openssl", "3.0.13");
    config.pins.save(&config.pins_path()).unwrap();
    config.masks.mask_in("testing", "openssl");
    config.masks.save(&config.masks_path()).unwrap();

    let reloaded = loader.load_from_directory(temp_dir.path()).unwrap();
    assert_eq!(reloaded.pins, config.pins);
    assert_eq!(reloaded.masks, config.masks);
    assert!(reloaded.masks.is_masked("openssl", Some("testing")));
}

#[test]
fn test_repositories_round_trip_keeps_legacy_entries() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("repos.toml");

    let mut repos = RepositoriesConfig::default();
    repos
        .add("core", RepositoryEntry::Location("/srv/core".to_string()))
        .unwrap();
    repos
        .add(
            "extra",
            RepositoryEntry::Detailed {
                location: "https://example.org/extra.git".to_string(),
                kind: RepoKind::Vcs,
                priority: 3,
            },
        )
        .unwrap();
    repos.save(&path).unwrap();

    let reloaded = RepositoriesConfig::load_from_file(&path).unwrap();
    assert_eq!(reloaded, repos);
    assert!(matches!(
        reloaded.get("core"),
        Some(RepositoryEntry::Location(_))
    ));
}

#[test]
fn test_missing_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("masks.toml");
    assert!(matches!(
        Masks::load_from_file(&path),
        Err(ConfigError::NotFound(p)) if p == path
    ));
    assert!(matches!(
        Pins::load_from_file(&path),
        Err(ConfigError::NotFound(_))
    ));
}
