//! End-to-end resolver scenarios (`SPEC_FULL.md` §8 scenarios 1 and 3).

mod common;

use common::FakeAdapter;
use larder::descriptor::CookbookDescriptor;
use larder::manifest::{Manifest, Requirement, SourceLocation};
use larder::resolver::{self, ResolverError};
use larder::version::{Constraint, ConstraintSet, Version};
use std::collections::HashMap;

#[tokio::test]
async fn basic_supermarket_resolution_picks_highest_satisfying_versions() {
    let mut catalog = HashMap::new();
    catalog.insert(
        "nginx".to_string(),
        vec![CookbookDescriptor::new(
            "nginx",
            Version::new(2, 7, 6),
            SourceLocation::supermarket("https://supermarket.chef.io"),
        )
        .with_dependency("apt", Constraint::parse("~> 2.2").unwrap())
        .with_dependency("build-essential", Constraint::parse("~> 2.0").unwrap())],
    );
    catalog.insert(
        "apt".to_string(),
        vec![
            CookbookDescriptor::new("apt", Version::new(2, 9, 2), SourceLocation::supermarket("https://supermarket.chef.io")),
            CookbookDescriptor::new("apt", Version::new(2, 2, 0), SourceLocation::supermarket("https://supermarket.chef.io")),
        ],
    );
    catalog.insert(
        "build-essential".to_string(),
        vec![
            CookbookDescriptor::new("build-essential", Version::new(2, 4, 0), SourceLocation::supermarket("https://supermarket.chef.io")),
            CookbookDescriptor::new("build-essential", Version::new(2, 0, 0), SourceLocation::supermarket("https://supermarket.chef.io")),
        ],
    );

    let adapters = vec![FakeAdapter::new("https://supermarket.chef.io", 100, catalog)];

    let mut manifest = Manifest::default();
    manifest.cookbooks.push(Requirement::new("nginx", ConstraintSet::parse("= 2.7.6").unwrap()));

    let resolution = resolver::resolve(&manifest, &adapters).await;

    assert!(resolution.is_ok(), "unexpected errors: {:?}", resolution.errors);
    assert_eq!(resolution.cookbooks["nginx"].version, Version::new(2, 7, 6));
    assert_eq!(resolution.cookbooks["apt"].version, Version::new(2, 9, 2));
    assert_eq!(resolution.cookbooks["build-essential"].version, Version::new(2, 4, 0));
}

#[tokio::test]
async fn three_way_cycle_is_detected() {
    let mut catalog = HashMap::new();
    catalog.insert(
        "a".to_string(),
        vec![CookbookDescriptor::new("a", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
            .with_dependency("b", Constraint::parse(">= 1.0.0").unwrap())],
    );
    catalog.insert(
        "b".to_string(),
        vec![CookbookDescriptor::new("b", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
            .with_dependency("c", Constraint::parse(">= 1.0.0").unwrap())],
    );
    catalog.insert(
        "c".to_string(),
        vec![CookbookDescriptor::new("c", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
            .with_dependency("a", Constraint::parse(">= 1.0.0").unwrap())],
    );

    let adapters = vec![FakeAdapter::new("fake", 100, catalog)];

    let mut manifest = Manifest::default();
    manifest.cookbooks.push(Requirement::new("a", ConstraintSet::parse(">= 1.0.0").unwrap()));

    let resolution = resolver::resolve(&manifest, &adapters).await;

    assert_eq!(resolution.cookbooks.len(), 3);
    assert!(resolution.graph.has_cycles());
    assert!(
        resolution
            .errors
            .iter()
            .any(|e| matches!(e, ResolverError::CircularDependency { .. }))
    );
}
