//! Installed-state database
//!
//! One record per installed package name. A disk-backed database stores each
//! record as `<dir>/<name>.toml`; a record is always rewritten whole, through
//! a temporary file and a rename, so readers never observe a partial write.

use crate::version::Version;
use crate::{ResolveError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Record of one installed package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstalledRecord {
    pub name: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    /// Owned files, relative to the target root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

impl InstalledRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            installed_at: Utc::now(),
            files: Vec::new(),
        }
    }

    pub fn with_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Parsed installed version
    pub fn parsed_version(&self) -> Result<Version> {
        Version::parse(&self.version)
    }
}

/// Read/write access to the installed set
pub trait InstalledState {
    fn get(&self, name: &str) -> Option<&InstalledRecord>;

    /// Installed package names in sorted order
    fn names(&self) -> Vec<String>;

    /// Store a record, replacing any previous record for the same name
    fn insert(&mut self, record: InstalledRecord) -> Result<()>;

    /// Uninstall `name`, returning its record if it was installed
    fn remove(&mut self, name: &str) -> Result<Option<InstalledRecord>>;

    fn is_installed(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn installed_version(&self, name: &str) -> Option<&str> {
        self.get(name).map(|r| r.version.as_str())
    }

    fn owned_files(&self, name: &str) -> &[PathBuf] {
        self.get(name).map(|r| r.files.as_slice()).unwrap_or(&[])
    }
}

/// Installed-record database, in memory or backed by a directory
#[derive(Debug, Clone, Default)]
pub struct InstalledDb {
    records: BTreeMap<String, InstalledRecord>,
    /// Directory holding one record file per package
    dir: Option<PathBuf>,
    /// Target root owned files are removed from on uninstall
    root: Option<PathBuf>,
}

impl InstalledDb {
    /// Database with no persistence
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (creating if needed) the database stored in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut records = BTreeMap::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        entries.sort();

        for path in entries {
            if path.extension().map_or(true, |ext| ext != "toml") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let record: InstalledRecord = toml::from_str(&content)?;
            records.insert(record.name.clone(), record);
        }

        debug!(dir = %dir.display(), records = records.len(), "opened installed database");
        Ok(Self {
            records,
            dir: Some(dir.to_path_buf()),
            root: None,
        })
    }

    /// Open the database at the configured state location, removing files
    /// below the configured target root on uninstall
    pub fn from_config(config: &pallet_config::Config) -> Result<Self> {
        Ok(Self::open(&config.installed_dir())?.with_root(config.root()))
    }

    /// Remove owned files below `root` when a package is uninstalled
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn records(&self) -> impl Iterator<Item = &InstalledRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.toml", name))
    }

    fn write_record(dir: &Path, record: &InstalledRecord) -> Result<()> {
        let path = Self::record_path(dir, &record.name);
        let tmp = dir.join(format!(".{}.toml.tmp", record.name));
        std::fs::write(&tmp, toml::to_string_pretty(record)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_owned_files(root: &Path, record: &InstalledRecord) -> Result<()> {
        for file in &record.files {
            if file.is_absolute() {
                return Err(ResolveError::ManifestInvalid {
                    package: record.name.clone(),
                    reason: format!("owned file '{}' is not relative", file.display()),
                });
            }
            match std::fs::remove_file(root.join(file)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(package = %record.name, file = %file.display(), "owned file already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl InstalledState for InstalledDb {
    fn get(&self, name: &str) -> Option<&InstalledRecord> {
        self.records.get(name)
    }

    fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    fn insert(&mut self, record: InstalledRecord) -> Result<()> {
        if let Some(dir) = &self.dir {
            Self::write_record(dir, &record)?;
        }
        info!(package = %record.name, version = %record.version, "recorded install");
        self.records.insert(record.name.clone(), record);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<Option<InstalledRecord>> {
        let Some(record) = self.records.get(name) else {
            return Ok(None);
        };

        if let Some(root) = &self.root {
            Self::remove_owned_files(root, record)?;
        }
        if let Some(dir) = &self.dir {
            std::fs::remove_file(Self::record_path(dir, name))?;
        }

        info!(package = %name, "removed install record");
        Ok(self.records.remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_insert_and_query() {
        let mut db = InstalledDb::in_memory();
        db.insert(InstalledRecord::new("zlib", "1.3").with_files(["usr/lib/libz.so"]))
            .unwrap();

        assert!(db.is_installed("zlib"));
        assert_eq!(db.installed_version("zlib"), Some("1.3"));
        assert_eq!(db.owned_files("zlib"), &[PathBuf::from("usr/lib/libz.so")]);
        assert!(!db.is_installed("curl"));
        assert!(db.owned_files("curl").is_empty());
    }

    #[test]
    fn test_insert_replaces_whole_record() {
        let mut db = InstalledDb::in_memory();
        db.insert(InstalledRecord::new("zlib", "1.2").with_files(["a", "b"]))
            .unwrap();
        db.insert(InstalledRecord::new("zlib", "1.3").with_files(["c"]))
            .unwrap();

        assert_eq!(db.len(), 1);
        assert_eq!(db.installed_version("zlib"), Some("1.3"));
        assert_eq!(db.owned_files("zlib").len(), 1);
    }

    #[test]
    fn test_persisted_records_reload() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut db = InstalledDb::open(temp_dir.path()).unwrap();
            db.insert(InstalledRecord::new("zlib", "1.3").with_files(["usr/lib/libz.so"]))
                .unwrap();
            db.insert(InstalledRecord::new("curl", "8.5.0")).unwrap();
        }

        let db = InstalledDb::open(temp_dir.path()).unwrap();
        assert_eq!(db.names(), vec!["curl".to_string(), "zlib".to_string()]);
        assert_eq!(db.owned_files("zlib"), &[PathBuf::from("usr/lib/libz.so")]);

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_remove_deletes_files_and_record() {
        let state = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("usr/bin")).unwrap();
        std::fs::write(root.path().join("usr/bin/tool"), "#!/bin/sh").unwrap();

        let mut db = InstalledDb::open(state.path()).unwrap().with_root(root.path());
        db.insert(InstalledRecord::new("tool", "1.0").with_files(["usr/bin/tool", "usr/share/missing"]))
            .unwrap();

        let removed = db.remove("tool").unwrap();
        assert_eq!(removed.map(|r| r.name), Some("tool".to_string()));
        assert!(!root.path().join("usr/bin/tool").exists());
        assert!(!state.path().join("tool.toml").exists());
        assert!(db.remove("tool").unwrap().is_none());
    }

    #[test]
    fn test_record_timestamp_serializes_rfc3339() {
        let record = InstalledRecord::new("zlib", "1.3");
        let text = toml::to_string(&record).unwrap();
        let parsed: InstalledRecord = toml::from_str(&text).unwrap();
        assert_eq!(parsed, record);
        assert!(text.contains("installed_at"));
    }
}
