//! End-to-end backtracking scenario (`SPEC_FULL.md` §8 scenario 4).

mod common;

use common::FakeAdapter;
use larder::adapters::SourceAdapter;
use larder::backtrack::ConstraintSolver;
use larder::descriptor::CookbookDescriptor;
use larder::manifest::{Manifest, Requirement, SourceLocation};
use larder::version::{Constraint, ConstraintSet, Version};
use std::collections::HashMap;

#[tokio::test]
async fn backtracking_solver_avoids_the_conflicting_branch() {
    let mut catalog = HashMap::new();
    catalog.insert(
        "app".to_string(),
        vec![CookbookDescriptor::new("app", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
            .with_dependency("database", Constraint::parse("~> 2.0").unwrap())
            .with_dependency("cache", Constraint::parse("~> 1.0").unwrap())],
    );
    catalog.insert(
        "cache".to_string(),
        vec![
            CookbookDescriptor::new("cache", Version::new(2, 0, 0), SourceLocation::supermarket("fake"))
                .with_dependency("database", Constraint::parse("~> 3.0").unwrap()),
            CookbookDescriptor::new("cache", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
                .with_dependency("database", Constraint::parse(">= 2.0").unwrap()),
        ],
    );
    catalog.insert(
        "database".to_string(),
        vec![
            CookbookDescriptor::new("database", Version::new(2, 0, 0), SourceLocation::supermarket("fake")),
            CookbookDescriptor::new("database", Version::new(3, 0, 0), SourceLocation::supermarket("fake")),
        ],
    );

    let adapters: Vec<Box<dyn SourceAdapter>> = vec![FakeAdapter::new("fake", 100, catalog)];

    let mut manifest = Manifest::default();
    manifest.cookbooks.push(Requirement::new("app", ConstraintSet::parse(">= 1.0.0").unwrap()));

    let solver = ConstraintSolver::new(&adapters);
    let solution = solver.solve(&manifest).await.unwrap();

    assert_eq!(solution["cache"].0, Version::new(1, 0, 0));
    assert_eq!(solution["database"].0, Version::new(2, 0, 0));
}
