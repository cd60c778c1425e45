//! Install batch computation tests

use pallet_config::RepoKind;
use pallet_resolve::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

// Test helper: batches from (package, dependencies) pairs
fn make_batches(packages: Vec<(&str, Vec<&str>)>) -> InstallBatches {
    let graph: BTreeMap<String, Vec<String>> = packages
        .into_iter()
        .map(|(name, deps)| {
            (
                name.to_string(),
                deps.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect();
    InstallBatches::from_graph(graph)
}

fn pkg(name: &str, depends: &[&str]) -> Manifest {
    let mut manifest = Manifest::new(name, Version::new(1, 0, 0));
    for dep in depends {
        manifest = manifest
            .with_dependency(DependencyKind::Required, dep)
            .unwrap();
    }
    manifest
}

#[test]
fn test_order_linear() {
    // app -> libfoo -> libc (sequential dependencies)
    let batches = make_batches(vec![
        ("app", vec!["libfoo"]),
        ("libfoo", vec!["libc"]),
        ("libc", vec![]),
    ]);

    assert_eq!(
        batches.batches().unwrap(),
        vec![vec!["libc"], vec!["libfoo"], vec!["app"]]
    );
}

#[test]
fn test_independent_packages_share_a_batch() {
    let batches = make_batches(vec![("zlib", vec![]), ("bzip2", vec![]), ("xz", vec![])]);

    let groups = batches.batches().unwrap();
    assert_eq!(groups.len(), 1);
    // Each group is sorted for deterministic output
    assert_eq!(groups[0], vec!["bzip2", "xz", "zlib"]);
}

#[test]
fn test_complex_graph() {
    //        app
    //      /  |  \
    //   curl git  vim
    //     |  / \
    //  openssl  pcre2
    //     |
    //   zlib
    let batches = make_batches(vec![
        ("app", vec!["curl", "git", "vim"]),
        ("curl", vec!["openssl"]),
        ("git", vec!["openssl", "pcre2"]),
        ("vim", vec![]),
        ("openssl", vec!["zlib"]),
        ("pcre2", vec![]),
        ("zlib", vec![]),
    ]);

    let groups = batches.batches().unwrap();
    assert_eq!(
        groups,
        vec![
            vec!["pcre2", "vim", "zlib"],
            vec!["openssl"],
            vec!["curl", "git"],
            vec!["app"],
        ]
    );
}

#[test]
fn test_circular_dependency_detected() {
    let batches = make_batches(vec![
        ("a", vec!["b"]),
        ("b", vec!["c"]),
        ("c", vec!["a"]),
        ("d", vec![]),
    ]);

    let err = batches.batches().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Circular dependency detected among: a, b, c"
    );
}

#[test]
fn test_plan_batches_skip_installed_dependencies() {
    let catalog = RepositorySet::new().with_repository(
        Repository::new("core", RepoKind::Local, 0)
            .with_manifest(pkg("zlib", &[]))
            .with_manifest(pkg("openssl", &["zlib"]))
            .with_manifest(pkg("pcre2", &[])),
    );
    let mut installed = InstalledDb::in_memory();
    installed
        .insert(InstalledRecord::new("zlib", "1.0.0"))
        .unwrap();
    let root = pkg("nginx", &["openssl", "pcre2"]);

    let plan = Resolver::new(&catalog, &mut installed)
        .resolve_install(&root, &ResolveOptions::default())
        .unwrap();

    assert_eq!(plan.names(), vec!["openssl", "pcre2", "nginx"]);
    assert_eq!(
        plan.batches().unwrap(),
        vec![
            vec!["openssl".to_string(), "pcre2".to_string()],
            vec!["nginx".to_string()],
        ]
    );
    assert_eq!(
        InstallBatches::new(&plan).dependencies("nginx"),
        Some(&["openssl".to_string(), "pcre2".to_string()][..])
    );
}
