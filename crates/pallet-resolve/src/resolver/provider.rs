//! Virtual package providers

use crate::catalog::Catalog;
use crate::constraint::{highest_satisfying, Constraint};
use crate::installed::InstalledState;
use crate::version::Version;
use pallet_config::Masks;
use std::collections::{BTreeMap, HashSet};

/// One published manifest providing a capability
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProviderEntry {
    package: String,
    repository: String,
    version: Version,
}

impl AsRef<Version> for ProviderEntry {
    fn as_ref(&self) -> &Version {
        &self.version
    }
}

/// Capability -> provider lookup built from one catalog scan
#[derive(Debug, Clone, Default)]
pub struct ProviderIndex {
    /// Names of concrete packages published anywhere
    packages: HashSet<String>,
    /// Capability -> providing manifests, in catalog order
    providers: BTreeMap<String, Vec<ProviderEntry>>,
}

impl ProviderIndex {
    pub fn build<C: Catalog + ?Sized>(catalog: &C) -> Self {
        let mut index = Self::default();
        for (repository, manifest) in catalog.manifests() {
            index.packages.insert(manifest.name.clone());
            for capability in &manifest.provides {
                index
                    .providers
                    .entry(capability.clone())
                    .or_default()
                    .push(ProviderEntry {
                        package: manifest.name.clone(),
                        repository: repository.to_string(),
                        version: manifest.version.clone(),
                    });
            }
        }
        index
    }

    /// True when no repository publishes a manifest named `name`
    pub fn is_virtual(&self, name: &str) -> bool {
        !self.packages.contains(name)
    }

    /// Packages providing `virtual_name`, in catalog order without repeats
    pub fn providers(&self, virtual_name: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in self.providers.get(virtual_name).into_iter().flatten() {
            if !names.contains(&entry.package.as_str()) {
                names.push(&entry.package);
            }
        }
        names
    }

    /// Concrete package to satisfy `virtual_name` under `constraint`
    ///
    /// An installed provider whose installed version satisfies the
    /// constraint wins outright. Otherwise the uninstalled provider with the
    /// highest satisfying published version is chosen. Masked providers are
    /// never returned.
    pub fn select_provider<S: InstalledState + ?Sized>(
        &self,
        virtual_name: &str,
        constraint: &Constraint,
        installed: &S,
        masks: &Masks,
    ) -> Option<String> {
        let providers = self.providers(virtual_name);

        let installed_match = providers.iter().find(|name| {
            !masks.is_masked(name, None)
                && installed
                    .installed_version(name)
                    .and_then(|v| Version::parse(v).ok())
                    .map_or(false, |v| constraint.satisfies(&v))
        });
        if let Some(name) = installed_match {
            return Some(name.to_string());
        }

        let candidates = self
            .providers
            .get(virtual_name)?
            .iter()
            .filter(|e| !installed.is_installed(&e.package))
            .filter(|e| !masks.is_masked(&e.package, Some(&e.repository)));

        highest_satisfying(candidates, constraint).map(|e| e.package.clone())
    }
}
