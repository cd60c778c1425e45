//! Install candidate selection

use crate::catalog::{Catalog, Published};
use crate::constraint::{highest_satisfying, Constraint};
use crate::version::Version;
use crate::{ResolveError, Result};
use pallet_config::{Masks, Pins};
use tracing::debug;

/// Pick the published version of `name` to install
///
/// Masks are applied first: a globally masked name, or a name whose every
/// published version sits in a masked repository, fails with
/// `PackageMasked`. A pin then selects its exact version, which must be
/// published unmasked and satisfy `constraint`. Without a pin the highest
/// satisfying version wins, ties going to the earlier repository.
pub(crate) fn select<C: Catalog + ?Sized>(
    catalog: &C,
    pins: &Pins,
    masks: &Masks,
    name: &str,
    constraint: &Constraint,
    required_by: &str,
) -> Result<Published> {
    if masks.is_masked(name, None) {
        return Err(ResolveError::PackageMasked {
            package: name.to_string(),
            repository: None,
        });
    }

    let (allowed, masked): (Vec<Published>, Vec<Published>) = catalog
        .available_versions(name)
        .into_iter()
        .partition(|p| !masks.is_masked(name, Some(&p.repository)));

    if allowed.is_empty() {
        if let Some(first) = masked.into_iter().next() {
            return Err(ResolveError::PackageMasked {
                package: name.to_string(),
                repository: Some(first.repository),
            });
        }
    }

    let unsatisfiable = || ResolveError::UnsatisfiableConstraint {
        package: name.to_string(),
        constraint: constraint.to_string(),
        required_by: required_by.to_string(),
    };

    if let Some(pin) = pins.pinned_version(name) {
        let pinned = Version::parse(pin)?;
        let published = allowed
            .into_iter()
            .find(|p| p.version == pinned)
            .ok_or_else(|| ResolveError::PinnedVersionUnavailable {
                package: name.to_string(),
                version: pin.to_string(),
            })?;
        if !constraint.satisfies(&published.version) {
            return Err(unsatisfiable());
        }
        debug!(package = %name, version = %published.version, "using pinned version");
        return Ok(published);
    }

    let selected = highest_satisfying(allowed, constraint).ok_or_else(unsatisfiable)?;
    debug!(
        package = %name,
        version = %selected.version,
        repository = %selected.repository,
        "selected candidate"
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Repository, RepositorySet};
    use crate::manifest::Manifest;
    use pallet_config::RepoKind;
    use pretty_assertions::assert_eq;

    fn catalog() -> RepositorySet {
        let m = |v: &str| Manifest::new("openssl", Version::parse(v).unwrap());
        RepositorySet::new()
            .with_repository(
                Repository::new("core", RepoKind::Local, 10)
                    .with_manifest(m("3.0.13"))
                    .with_manifest(m("3.2.1")),
            )
            .with_repository(
                Repository::new("testing", RepoKind::Local, 0)
                    .with_manifest(m("3.2.1"))
                    .with_manifest(m("3.3.0-beta1")),
            )
    }

    fn pick(pins: &Pins, masks: &Masks, constraint: &str) -> Result<Published> {
        select(
            &catalog(),
            pins,
            masks,
            "openssl",
            &Constraint::parse(constraint).unwrap(),
            "curl",
        )
    }

    #[test]
    fn test_highest_and_tie_goes_to_priority() {
        let picked = pick(&Pins::new(), &Masks::new(), "^3.0").unwrap();
        assert_eq!(picked.version, Version::parse("3.3.0-beta1").unwrap());

        let picked = pick(&Pins::new(), &Masks::new(), "<3.3").unwrap();
        assert_eq!(picked.version, Version::new(3, 2, 1));
        assert_eq!(picked.repository, "core");
    }

    #[test]
    fn test_repository_mask_filters() {
        let mut masks = Masks::new();
        masks.mask_in("testing", "openssl");

        let picked = pick(&Pins::new(), &masks, "*").unwrap();
        assert_eq!(picked.version, Version::new(3, 2, 1));
        assert_eq!(picked.repository, "core");
    }

    #[test]
    fn test_masked_everywhere() {
        let mut masks = Masks::new();
        masks.mask("openssl");
        assert!(matches!(
            pick(&Pins::new(), &masks, "*"),
            Err(ResolveError::PackageMasked { repository: None, .. })
        ));

        let mut masks = Masks::new();
        masks.mask_in("core", "openssl");
        masks.mask_in("testing", "openssl");
        assert!(matches!(
            pick(&Pins::new(), &masks, "*"),
            Err(ResolveError::PackageMasked { repository: Some(_), .. })
        ));
    }

    #[test]
    fn test_pins() {
        let mut pins = Pins::new();
        pins.pin("openssl", "3.0.13");
        assert_eq!(pick(&pins, &Masks::new(), "*").unwrap().version, Version::new(3, 0, 13));

        assert!(matches!(
            pick(&pins, &Masks::new(), ">=3.1"),
            Err(ResolveError::UnsatisfiableConstraint { .. })
        ));

        pins.pin("openssl", "1.1.1");
        assert!(matches!(
            pick(&pins, &Masks::new(), "*"),
            Err(ResolveError::PinnedVersionUnavailable { .. })
        ));
    }

    #[test]
    fn test_unsatisfiable_and_unknown() {
        let err = pick(&Pins::new(), &Masks::new(), ">=4").unwrap_err();
        assert_eq!(
            err.to_string(),
            "No version of 'openssl' satisfies >=4 (required by curl)"
        );

        let err = select(
            &catalog(),
            &Pins::new(),
            &Masks::new(),
            "libressl",
            &Constraint::Any,
            "curl",
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::UnsatisfiableConstraint { .. }));
    }
}
