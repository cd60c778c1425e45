//! Dependency resolution
//!
//! Greedy and deterministic: each dependency takes its pinned version or the
//! highest satisfying unmasked published version, and the first success
//! wins. Nothing is retried with another version on failure. The walk state
//! (visited names, versions chosen so far, the growing plan and the
//! conflicts found) is a value threaded through each recursive call, so no
//! state outlives one resolution.

mod candidate;
pub mod conflict;
mod plan;
mod provider;

pub use conflict::{Conflict, ConflictAction, ConflictChecker, ConflictReason};
pub use plan::{Plan, PlannedPackage};
pub use provider::ProviderIndex;

use crate::catalog::Catalog;
use crate::constraint::Constraint;
use crate::installed::InstalledState;
use crate::manifest::{Dependency, DependencyKind, Manifest};
use crate::version::Version;
use crate::{ResolveError, Result};
use pallet_config::{Config, Masks, Pins};
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Caller choices for one resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Uninstall conflicting and replaced packages
    pub force: bool,
    /// Plan the root even when it is installed at the same version
    pub reinstall: bool,
    /// Also run the optional pass over the root's optional dependencies
    pub optional: bool,
}

impl ResolveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            optional: config.resolve_optional(),
            ..Self::default()
        }
    }
}

/// State of one resolution walk
#[derive(Debug, Default)]
struct Walk {
    visited: HashSet<String>,
    chosen: HashMap<String, Version>,
    /// Installed names with a pending upgrade; their installed version is
    /// not final
    upgrading: HashSet<String>,
    /// Installed names a planned package depends on, with the first
    /// dependent seen
    relied_on: HashMap<String, String>,
    plan: Plan,
    /// Manifests of the planned packages, in plan order
    manifests: Vec<Manifest>,
    conflicts: Vec<Conflict>,
}

/// Dependency resolver over a catalog and the installed set
pub struct Resolver<'a, C: Catalog + ?Sized, S: InstalledState + ?Sized> {
    catalog: &'a C,
    installed: &'a mut S,
    pins: Pins,
    masks: Masks,
    /// Built on first virtual lookup
    providers: OnceCell<ProviderIndex>,
}

impl<'a, C, S> Resolver<'a, C, S>
where
    C: Catalog + ?Sized,
    S: InstalledState + ?Sized,
{
    pub fn new(catalog: &'a C, installed: &'a mut S) -> Self {
        Self {
            catalog,
            installed,
            pins: Pins::new(),
            masks: Masks::new(),
            providers: OnceCell::new(),
        }
    }

    /// Resolver using the pins and masks of `config`
    pub fn from_config(config: &Config, catalog: &'a C, installed: &'a mut S) -> Self {
        Self::new(catalog, installed)
            .with_pins(config.pins.clone())
            .with_masks(config.masks.clone())
    }

    pub fn with_pins(mut self, pins: Pins) -> Self {
        self.pins = pins;
        self
    }

    pub fn with_masks(mut self, masks: Masks) -> Self {
        self.masks = masks;
        self
    }

    pub fn installed(&self) -> &S {
        &*self.installed
    }

    /// Ordered plan for installing `root` and its missing dependencies
    ///
    /// All or nothing: any failure leaves installed state untouched. Blocking
    /// conflicts fail with `UnresolvableConflict` unless `options.force`, in
    /// which case the conflicting packages are uninstalled once the complete
    /// plan exists and are listed in `Plan::removed`.
    #[tracing::instrument(skip(self, root), fields(package = %root.name, version = %root.version))]
    pub fn resolve_install(&mut self, root: &Manifest, options: &ResolveOptions) -> Result<Plan> {
        self.install_root(root, None, options)
    }

    /// Plan for the not yet installed optional dependencies of `root`
    #[tracing::instrument(skip(self, root), fields(package = %root.name))]
    pub fn resolve_optional(&mut self, root: &Manifest) -> Result<Plan> {
        let walk = self.optional_pass(root, Walk::default())?;
        self.finish(&root.name, walk, false)
    }

    /// Plan for installing a published package (or capability) by name
    #[tracing::instrument(skip(self))]
    pub fn resolve_install_by_name(
        &mut self,
        name: &str,
        constraint: &Constraint,
        options: &ResolveOptions,
    ) -> Result<Plan> {
        let request = Dependency::new(name, constraint.clone(), DependencyKind::Required);
        let request = self.concrete(request, &Walk::default());
        let candidate = candidate::select(
            self.catalog,
            &self.pins,
            &self.masks,
            &request.name,
            &request.constraint,
            "install request",
        )?;
        let manifest = self
            .catalog
            .load(&request.name, &candidate.version, Some(&candidate.repository))?;
        self.install_root(&manifest, Some(&candidate.repository), options)
    }

    /// Plan for moving an installed package to its pinned or newest version
    ///
    /// Empty when the installed version is already current: at or above the
    /// newest published version, or exactly the pinned one.
    #[tracing::instrument(skip(self))]
    pub fn resolve_upgrade(&mut self, name: &str, options: &ResolveOptions) -> Result<Plan> {
        match self.upgrade_target(name)? {
            Some((manifest, repository)) => self.install_root(&manifest, Some(&repository), options),
            None => Ok(Plan::new()),
        }
    }

    /// One plan upgrading every installed package that has a newer (or
    /// differently pinned) published version
    ///
    /// Installed packages missing from every repository, or masked, are left
    /// alone.
    #[tracing::instrument(skip(self))]
    pub fn resolve_upgrades(&mut self, options: &ResolveOptions) -> Result<Plan> {
        let mut targets = Vec::new();
        for name in self.installed.names() {
            if !self.catalog.contains(&name) {
                debug!(package = %name, "not published, skipping upgrade");
                continue;
            }
            match self.upgrade_target(&name) {
                Ok(Some(target)) => targets.push(target),
                Ok(None) => {}
                Err(ResolveError::PackageMasked { .. }) => {
                    warn!(package = %name, "masked, skipping upgrade");
                }
                Err(e) => return Err(e),
            }
        }

        let mut walk = Walk {
            upgrading: targets.iter().map(|(m, _)| m.name.clone()).collect(),
            ..Walk::default()
        };
        for (manifest, repository) in &targets {
            walk = self.visit(
                manifest,
                Some(repository.as_str()),
                DependencyKind::Required,
                false,
                walk,
            )?;
        }

        self.finish("upgrade", walk, options.force)
    }

    /// Conflicts installing `manifest` as `name` would raise right now
    pub fn check_conflicts(&self, name: &str, manifest: &Manifest) -> Vec<Conflict> {
        ConflictChecker::check_conflicts(&*self.installed, name, manifest)
    }

    /// Concrete package to satisfy a capability, if any
    pub fn select_provider(&self, virtual_name: &str, constraint: &Constraint) -> Option<String> {
        self.provider_index()
            .select_provider(virtual_name, constraint, &*self.installed, &self.masks)
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.provider_index().is_virtual(name)
    }

    pub fn providers(&self, virtual_name: &str) -> Vec<String> {
        self.provider_index()
            .providers(virtual_name)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn provider_index(&self) -> &ProviderIndex {
        self.providers
            .get_or_init(|| ProviderIndex::build(self.catalog))
    }

    fn install_root(
        &mut self,
        root: &Manifest,
        repository: Option<&str>,
        options: &ResolveOptions,
    ) -> Result<Plan> {
        if self.masks.is_masked(&root.name, None) {
            return Err(ResolveError::PackageMasked {
                package: root.name.clone(),
                repository: None,
            });
        }

        let mut walk = self.visit(
            root,
            repository,
            DependencyKind::Required,
            options.reinstall,
            Walk::default(),
        )?;
        if options.optional {
            walk = self.optional_pass(root, walk)?;
        }

        self.finish(&root.name, walk, options.force)
    }

    /// Post-order visit: dependencies are planned before `manifest`
    fn visit(
        &self,
        manifest: &Manifest,
        repository: Option<&str>,
        kind: DependencyKind,
        reinstall: bool,
        mut walk: Walk,
    ) -> Result<Walk> {
        if !walk.visited.insert(manifest.name.clone()) {
            return Ok(walk);
        }
        walk.chosen
            .insert(manifest.name.clone(), manifest.version.clone());

        let planned = match self.installed.installed_version(&manifest.name) {
            Some(installed) => reinstall || Version::parse(installed)? != manifest.version,
            None => true,
        };

        for (name, kinds) in manifest.dependency_collisions() {
            warn!(
                package = %manifest.name,
                dependency = %name,
                ?kinds,
                "dependency declared under several kinds, last kind wins"
            );
        }

        let mut dependencies: Vec<String> = Vec::new();
        for dep in manifest.merged_dependencies() {
            let dep = self.concrete(dep, &walk);

            if let Some(chosen) = walk.chosen.get(&dep.name) {
                Self::check_chosen(&manifest.name, &dep, chosen)?;
            } else if let Some(installed) = self
                .installed
                .installed_version(&dep.name)
                .filter(|_| !walk.upgrading.contains(&dep.name))
            {
                Self::verify_installed(&manifest.name, &dep, installed)?;
                if dep.kind != DependencyKind::Optional {
                    walk.relied_on
                        .entry(dep.name)
                        .or_insert_with(|| manifest.name.clone());
                }
                continue;
            } else if dep.kind == DependencyKind::Optional {
                debug!(package = %manifest.name, dependency = %dep.name, "skipping optional dependency");
                continue;
            } else {
                walk = self.visit_dependency(&manifest.name, &dep, walk)?;
            }

            if !walk.plan.contains(&dep.name) {
                // Still on the walk stack: a cycle back to an ancestor
                debug!(package = %manifest.name, dependency = %dep.name, "dependency cycle");
            } else if !dependencies.contains(&dep.name) {
                dependencies.push(dep.name);
            }
        }

        if planned {
            walk.conflicts.extend(ConflictChecker::check_conflicts(
                &*self.installed,
                &manifest.name,
                manifest,
            ));
            debug!(package = %manifest.name, version = %manifest.version, %kind, "planned");
            walk.plan.push(PlannedPackage {
                name: manifest.name.clone(),
                version: manifest.version.clone(),
                repository: repository.map(str::to_string),
                kind,
                dependencies,
            });
            walk.manifests.push(manifest.clone());
        } else {
            debug!(package = %manifest.name, "already installed");
        }

        Ok(walk)
    }

    /// Select, load and visit a dependency that is neither installed nor
    /// chosen yet
    fn visit_dependency(&self, dependent: &str, dep: &Dependency, walk: Walk) -> Result<Walk> {
        let candidate = candidate::select(
            self.catalog,
            &self.pins,
            &self.masks,
            &dep.name,
            &dep.constraint,
            dependent,
        )?;
        let manifest = self
            .catalog
            .load(&dep.name, &candidate.version, Some(&candidate.repository))?;
        self.visit(&manifest, Some(&candidate.repository), dep.kind, false, walk)
    }

    /// Walk only the optional edges of `root`, following the normal rules
    /// below each of them
    fn optional_pass(&self, root: &Manifest, mut walk: Walk) -> Result<Walk> {
        walk.visited.insert(root.name.clone());
        walk.chosen
            .entry(root.name.clone())
            .or_insert_with(|| root.version.clone());

        let optional = root
            .merged_dependencies()
            .into_iter()
            .filter(|d| d.kind == DependencyKind::Optional);

        for dep in optional {
            let dep = self.concrete(dep, &walk);

            if let Some(chosen) = walk.chosen.get(&dep.name) {
                Self::check_chosen(&root.name, &dep, chosen)?;
            } else if let Some(installed) = self.installed.installed_version(&dep.name) {
                Self::verify_installed(&root.name, &dep, installed)?;
            } else {
                walk = self.visit_dependency(&root.name, &dep, walk)?;
            }
        }

        Ok(walk)
    }

    /// Rewrite a capability name to a concrete provider
    ///
    /// A provider already chosen in this walk is reused. Names without a
    /// provider pass through unchanged and fail later at selection.
    fn concrete(&self, dep: Dependency, walk: &Walk) -> Dependency {
        let index = self.provider_index();
        if !index.is_virtual(&dep.name) || self.installed.is_installed(&dep.name) {
            return dep;
        }

        let reused = index.providers(&dep.name).into_iter().find(|p| {
            walk.chosen
                .get(*p)
                .map_or(false, |v| dep.constraint.satisfies(v))
        });
        let provider = match reused {
            Some(p) => Some(p.to_string()),
            None => index.select_provider(&dep.name, &dep.constraint, &*self.installed, &self.masks),
        };

        match provider {
            Some(provider) => {
                debug!(capability = %dep.name, provider = %provider, "resolved virtual dependency");
                Dependency { name: provider, ..dep }
            }
            None => {
                debug!(capability = %dep.name, "no provider");
                dep
            }
        }
    }

    /// A name chosen earlier in the walk must satisfy every later constraint
    fn check_chosen(dependent: &str, dep: &Dependency, chosen: &Version) -> Result<()> {
        if dep.constraint.satisfies(chosen) {
            return Ok(());
        }
        if dep.kind == DependencyKind::Optional {
            warn!(
                package = %dependent,
                dependency = %dep.name,
                chosen = %chosen,
                constraint = %dep.constraint,
                "optional dependency constraint not met by chosen version"
            );
            return Ok(());
        }
        Err(ResolveError::UnsatisfiableConstraint {
            package: dep.name.clone(),
            constraint: dep.constraint.to_string(),
            required_by: dependent.to_string(),
        })
    }

    fn verify_installed(dependent: &str, dep: &Dependency, installed: &str) -> Result<()> {
        let version = Version::parse(installed)?;
        if dep.constraint.satisfies(&version) {
            return Ok(());
        }
        if dep.kind == DependencyKind::Optional {
            warn!(
                package = %dependent,
                dependency = %dep.name,
                installed = %version,
                constraint = %dep.constraint,
                "installed optional dependency does not satisfy constraint"
            );
            return Ok(());
        }
        Err(ResolveError::InstalledVersionMismatch {
            package: dep.name.clone(),
            installed: installed.to_string(),
            constraint: dep.constraint.to_string(),
            required_by: dependent.to_string(),
        })
    }

    /// Version and manifest `name` should move to, or `None` when current
    fn upgrade_target(&self, name: &str) -> Result<Option<(Manifest, String)>> {
        let installed = match self.installed.installed_version(name) {
            Some(v) => Version::parse(v)?,
            None => return Err(ResolveError::NotFound(format!("{} is not installed", name))),
        };

        let candidate = candidate::select(
            self.catalog,
            &self.pins,
            &self.masks,
            name,
            &Constraint::Any,
            "upgrade request",
        )?;

        let current = if self.pins.pinned_version(name).is_some() {
            installed == candidate.version
        } else {
            installed >= candidate.version
        };
        if current {
            debug!(package = %name, version = %installed, "already current");
            return Ok(None);
        }

        info!(package = %name, from = %installed, to = %candidate.version, "upgrade available");
        let manifest = self
            .catalog
            .load(name, &candidate.version, Some(&candidate.repository))?;
        Ok(Some((manifest, candidate.repository)))
    }

    /// Clear conflicts and hand out the plan
    fn finish(&mut self, package: &str, walk: Walk, force: bool) -> Result<Plan> {
        let Walk {
            mut plan,
            mut conflicts,
            manifests,
            relied_on,
            ..
        } = walk;

        conflicts.extend(ConflictChecker::check_planned(&manifests));
        if force {
            Self::check_removals(package, &conflicts, &relied_on, &manifests)?;
        }

        let removed = conflict::blocking_packages(&conflicts);
        if !ConflictChecker::resolve_conflicts(&mut *self.installed, &conflicts, force)? {
            return Err(ResolveError::UnresolvableConflict {
                package: package.to_string(),
                conflicts,
            });
        }

        plan.removed = removed;
        plan.conflicts = conflicts;
        info!(
            package = %package,
            steps = plan.len(),
            removed = plan.removed.len(),
            "resolution complete"
        );
        Ok(plan)
    }

    /// A forced removal may not take away an installed package that a
    /// planned package still depends on, unless a planned package is or
    /// provides it
    fn check_removals(
        package: &str,
        conflicts: &[Conflict],
        relied_on: &HashMap<String, String>,
        manifests: &[Manifest],
    ) -> Result<()> {
        for removal in conflict::blocking_packages(conflicts) {
            let Some(dependent) = relied_on.get(&removal) else {
                continue;
            };
            let replaced = manifests
                .iter()
                .any(|m| m.name == removal || m.provides.contains(&removal));
            if !replaced {
                warn!(package = %removal, required_by = %dependent, "conflicting package is still required");
                return Err(ResolveError::UnresolvableConflict {
                    package: package.to_string(),
                    conflicts: conflicts.to_vec(),
                });
            }
        }
        Ok(())
    }
}
