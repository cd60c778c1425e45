//! Repository loading, installed-state persistence and configured end-to-end
//! resolution

use pallet_config::{ConfigLoader, RepoKind};
use pallet_resolve::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

mod repository_loading {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_dir_reads_manifests_in_file_order() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            temp_dir.path(),
            "zlib/1.3.1.toml",
            r#"
name = "zlib"
version = "1.3.1"
files = ["usr/lib/libz.so"]
"#,
        );
        write_file(
            temp_dir.path(),
            "curl/8.5.0.toml",
            r#"
name = "curl"
version = "8.5.0"
depends = ["zlib>=1.3", "openssl ^3"]
"#,
        );
        write_file(temp_dir.path(), "README.md", "not a manifest");

        let repo = Repository::load_dir("core", temp_dir.path(), RepoKind::Local, 0).unwrap();

        let names: Vec<&str> = repo.manifests().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["curl", "zlib"]);
        assert_eq!(repo.location, temp_dir.path());
    }

    #[test]
    fn test_invalid_manifests_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "good.toml", "name = \"good\"\nversion = \"1.0\"\n");
        write_file(temp_dir.path(), "broken.toml", "name = \"broken\"\nversion = ");
        write_file(temp_dir.path(), "unknown-field.toml", "name = \"odd\"\nversion = \"1.0\"\nsource = \"x\"\n");
        write_file(
            temp_dir.path(),
            "self-dep.toml",
            "name = \"loop\"\nversion = \"1.0\"\ndepends = [\"loop\"]\n",
        );
        write_file(temp_dir.path(), "bad-name.toml", "name = \"Bad Name\"\nversion = \"1.0\"\n");

        let repo = Repository::load_dir("core", temp_dir.path(), RepoKind::Local, 0).unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.manifests()[0].name, "good");
    }

    #[test]
    fn test_lints_do_not_skip() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            temp_dir.path(),
            "app.toml",
            r#"
name = "app"
version = "1.0"
depends = ["zlib"]
build_depends = ["zlib>=1.3"]
"#,
        );

        let repo = Repository::load_dir("core", temp_dir.path(), RepoKind::Local, 0).unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(Validator::lint(&repo.manifests()[0]).len(), 1);
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = Repository::load_dir("core", &temp_dir.path().join("absent"), RepoKind::Local, 0);
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
    }
}

mod installed_records {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_records_are_whole_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = InstalledDb::open(temp_dir.path()).unwrap();
        db.insert(InstalledRecord::new("zlib", "1.3.1").with_files(["usr/lib/libz.so"]))
            .unwrap();

        let content = fs::read_to_string(temp_dir.path().join("zlib.toml")).unwrap();
        let record: InstalledRecord = toml::from_str(&content).unwrap();
        assert_eq!(record.name, "zlib");
        assert_eq!(record.parsed_version().unwrap(), Version::new(1, 3, 1));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "zlib.toml", "name = \"zlib\"\n");

        assert!(matches!(
            InstalledDb::open(temp_dir.path()),
            Err(ResolveError::Parse(_))
        ));
    }
}

mod configured {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Config directory with two local repositories and a pin
    fn setup(temp_dir: &TempDir) -> pallet_config::Config {
        let base = temp_dir.path();
        let core = base.join("repos/core");
        let testing = base.join("repos/testing");

        write_file(&core, "zlib-1.2.13.toml", "name = \"zlib\"\nversion = \"1.2.13\"\n");
        write_file(&core, "zlib-1.3.1.toml", "name = \"zlib\"\nversion = \"1.3.1\"\n");
        write_file(
            &core,
            "curl.toml",
            "name = \"curl\"\nversion = \"8.5.0\"\ndepends = [\"zlib\"]\nfiles = [\"usr/bin/curl\"]\n",
        );
        write_file(&testing, "zlib-1.4.0.toml", "name = \"zlib\"\nversion = \"1.4.0\"\n");

        let config_dir = base.join("config");
        write_file(
            &config_dir,
            "config.toml",
            &format!(
                "[paths]\nroot = '{}'\nstate = '{}'\n",
                base.join("root").display(),
                base.join("state").display()
            ),
        );
        write_file(
            &config_dir,
            "repos.toml",
            &format!(
                "[repositories]\ncore = '{}'\ntesting = {{ location = '{}', priority = 5 }}\n",
                core.display(),
                testing.display()
            ),
        );
        write_file(&config_dir, "masks.toml", "[repositories]\ntesting = [\"zlib\"]\n");

        ConfigLoader::new().load_from_directory(&config_dir).unwrap()
    }

    #[test]
    fn test_repository_set_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = setup(&temp_dir);

        let catalog = RepositorySet::from_config(&config).unwrap();
        let names: Vec<&str> = catalog.repositories().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["testing", "core"]);
        assert_eq!(catalog.available_versions("zlib").len(), 3);
    }

    #[test]
    fn test_resolve_with_configured_masks() {
        let temp_dir = TempDir::new().unwrap();
        let config = setup(&temp_dir);
        let catalog = RepositorySet::from_config(&config).unwrap();
        let mut db = InstalledDb::from_config(&config).unwrap();

        let plan = Resolver::from_config(&config, &catalog, &mut db)
            .resolve_install_by_name("curl", &Constraint::Any, &ResolveOptions::from_config(&config))
            .unwrap();

        // zlib 1.4.0 is masked in testing
        assert_eq!(
            plan.entries(),
            vec![
                ("zlib", &Version::new(1, 3, 1)),
                ("curl", &Version::new(8, 5, 0)),
            ]
        );
    }

    #[test]
    fn test_uninstall_removes_files_under_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = setup(&temp_dir);
        write_file(config.root(), "usr/bin/curl", "#!/bin/sh\n");

        let mut db = InstalledDb::from_config(&config).unwrap();
        db.insert(InstalledRecord::new("curl", "8.5.0").with_files(["usr/bin/curl"]))
            .unwrap();
        assert!(config.installed_dir().join("curl.toml").exists());

        db.remove("curl").unwrap();
        assert!(!config.root().join("usr/bin/curl").exists());
        assert!(!config.installed_dir().join("curl.toml").exists());

        let reopened = InstalledDb::from_config(&config).unwrap();
        assert!(reopened.is_empty());
    }
}
