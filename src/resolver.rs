//! Default eager resolver: a breadth-first walk over requirements that
//! picks the highest version satisfying each constraint and fails fast on
//! an unsatisfiable shared transitive dependency instead of silently
//! overwriting it (see `SPEC_FULL.md` §9).

use crate::adapters::SourceAdapter;
use crate::descriptor::CookbookDescriptor;
use crate::graph::DependencyGraph;
use crate::manifest::{Manifest, Requirement, SourceLocation};
use crate::version::{Constraint, ConstraintSet, Version};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use thiserror::Error;

/// Per-adapter, per-name memoization cap: the resolver never considers
/// more than this many candidate versions for one cookbook.
const MAX_CANDIDATES: usize = 100;

#[derive(Debug, Error, Clone)]
pub enum ResolverError {
    #[error("no source could resolve '{name}'")]
    Unresolvable { name: String },

    #[error("no version of '{name}' satisfies {constraint}")]
    NoSatisfyingVersion { name: String, constraint: String },

    #[error("conflicting constraints on '{name}': {a} vs {b}")]
    Conflict { name: String, a: String, b: String },

    #[error("circular dependency involving '{name}'")]
    CircularDependency { name: String },
}

#[derive(Debug, Clone)]
pub struct ResolvedCookbook {
    pub name: String,
    pub version: Version,
    pub source_location: SourceLocation,
    pub dependencies: HashMap<String, Version>,
    pub descriptor: CookbookDescriptor,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub cookbooks: HashMap<String, ResolvedCookbook>,
    pub errors: Vec<ResolverError>,
}

struct VersionListCache {
    lists: RwLock<HashMap<(String, String), Vec<Version>>>,
}

impl VersionListCache {
    fn new() -> Self {
        Self {
            lists: RwLock::new(HashMap::new()),
        }
    }

    async fn get_or_fetch(
        &self,
        adapter: &dyn SourceAdapter,
        name: &str,
    ) -> Result<Vec<Version>, ResolverError> {
        let key = (adapter.name(), name.to_string());
        if let Some(cached) = self
            .lists
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
        {
            return Ok(cached.clone());
        }

        let mut versions = adapter
            .list_versions(name)
            .await
            .map_err(|_| ResolverError::Unresolvable { name: name.to_string() })?;
        versions.sort_by(|a, b| b.compare(a));
        versions.truncate(MAX_CANDIDATES);

        self.lists
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, versions.clone());
        Ok(versions)
    }
}

/// Resolve `manifest`'s requirements against `adapters`, in declaration
/// order, trying each adapter until one can satisfy a requirement (or, if
/// the requirement carries a source override, using only that adapter).
///
/// # Errors
///
/// Returns a [`ResolverError`] inside `Resolution::errors` is reported
/// back rather than short-circuiting, so callers see partial progress;
/// this function itself only errors on a hard conflict.
pub async fn resolve(
    manifest: &Manifest,
    adapters: &[Box<dyn SourceAdapter>],
) -> Resolution {
    let mut graph = DependencyGraph::new();
    let mut cookbooks: HashMap<String, ResolvedCookbook> = HashMap::new();
    let mut constraints: HashMap<String, ConstraintSet> = HashMap::new();
    let mut errors = Vec::new();
    let version_cache = VersionListCache::new();

    let mut queue: VecDeque<Requirement> = manifest.all_requirements().into_iter().cloned().collect();
    for requirement in &queue {
        constraints.insert(requirement.name.clone(), requirement.constraint.clone());
    }

    while let Some(requirement) = queue.pop_front() {
        if cookbooks.contains_key(&requirement.name) {
            continue;
        }

        // A later sibling may have merged a tighter constraint into
        // `constraints` after this requirement was queued; that
        // accumulated constraint, not the one captured at queue time, is
        // the one every candidate must satisfy.
        let constraint = constraints
            .get(&requirement.name)
            .cloned()
            .unwrap_or_else(|| requirement.constraint.clone());

        // Gather every (version, adapter) pair across all adapters that can
        // satisfy this requirement, then pick the maximum version, breaking
        // ties by adapter priority and finally by declaration order, so
        // Resolutions are reproducible regardless of adapter iteration
        // order.
        let mut candidates: Vec<(Version, u8, usize, &dyn SourceAdapter)> = Vec::new();
        for (declaration_index, adapter) in adapters.iter().enumerate() {
            let versions = match version_cache.get_or_fetch(adapter.as_ref(), &requirement.name).await {
                Ok(v) => v,
                Err(_) => continue,
            };
            for version in versions {
                if constraint.matches(&version) {
                    candidates.push((version, adapter.priority(), declaration_index, adapter.as_ref()));
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.0.compare(&a.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let mut found = None;
        for (version, _priority, _declaration_index, adapter) in &candidates {
            if let Ok(descriptor) = adapter.fetch_descriptor(&requirement.name, version).await {
                found = Some((*adapter, descriptor));
                break;
            }
        }

        let Some((adapter, descriptor)) = found else {
            errors.push(ResolverError::NoSatisfyingVersion {
                name: requirement.name.clone(),
                constraint: constraint.to_string(),
            });
            continue;
        };

        let node = graph.add_cookbook(&requirement.name, descriptor.version.to_string());
        let mut dep_versions = HashMap::new();
        let mut has_conflict = false;

        for (dep_name, dep_constraint) in &descriptor.dependencies {
            let dep_set = ConstraintSet::parse(&dep_constraint.to_string())
                .unwrap_or_else(|_| ConstraintSet::any());
            dep_versions.insert(dep_name.clone(), dep_constraint.version.clone());

            if let Some(resolved) = cookbooks.get(dep_name) {
                // Already resolved: this is only a conflict if the already
                // chosen version doesn't actually satisfy this new
                // constraint, not merely because the constraint sets differ.
                if !dep_set.matches(&resolved.version) {
                    errors.push(ResolverError::Conflict {
                        name: dep_name.clone(),
                        a: constraints.get(dep_name).map_or_else(String::new, ToString::to_string),
                        b: dep_set.to_string(),
                    });
                    has_conflict = true;
                }
                continue;
            }

            match constraints.get(dep_name).cloned() {
                Some(existing) => {
                    let mut merged = existing.clone();
                    merged.constraints.extend(dep_set.constraints.clone());

                    // Compatible constraints on a shared transitive
                    // dependency (a diamond) only conflict if no available
                    // version satisfies their intersection.
                    let mut satisfiable = false;
                    for adapter in adapters {
                        if let Ok(versions) = version_cache.get_or_fetch(adapter.as_ref(), dep_name).await {
                            if versions.iter().any(|v| merged.matches(v)) {
                                satisfiable = true;
                                break;
                            }
                        }
                    }

                    if satisfiable {
                        constraints.insert(dep_name.clone(), merged);
                    } else {
                        errors.push(ResolverError::Conflict {
                            name: dep_name.clone(),
                            a: existing.to_string(),
                            b: dep_set.to_string(),
                        });
                        has_conflict = true;
                    }
                }
                None => {
                    constraints.insert(dep_name.clone(), dep_set.clone());
                    queue.push_back(Requirement::new(dep_name.clone(), dep_set));
                }
            }
        }

        if has_conflict {
            continue;
        }

        cookbooks.insert(
            requirement.name.clone(),
            ResolvedCookbook {
                name: requirement.name.clone(),
                version: descriptor.version.clone(),
                source_location: adapter.source_location(),
                dependencies: dep_versions,
                descriptor,
            },
        );
        let _ = node;
    }

    for cookbook in cookbooks.values() {
        let from = graph
            .node_id(&cookbook.name)
            .expect("every resolved cookbook was added to the graph above");
        for dep_name in cookbook.dependencies.keys() {
            if let Some(to) = graph.node_id(dep_name) {
                let _ = graph.add_dependency(from, to);
            }
        }
    }

    if graph.has_cycles() {
        if let Some(name) = cookbooks.keys().next() {
            errors.push(ResolverError::CircularDependency { name: name.clone() });
        }
    }

    Resolution {
        graph,
        cookbooks,
        errors,
    }
}

impl Resolution {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Used when a dependency's declared constraint can't be re-parsed as a
/// [`ConstraintSet`] (should not normally happen since [`Constraint`]'s
/// `Display` round-trips).
#[must_use]
pub fn exact_constraint(version: &Version) -> Constraint {
    Constraint::exact(version.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterError;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    struct FakeAdapter {
        label: String,
        priority: u8,
        catalog: Mutex<Map<String, Vec<CookbookDescriptor>>>,
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn name(&self) -> String {
            self.label.clone()
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        fn source_location(&self) -> SourceLocation {
            SourceLocation::supermarket(self.label.clone())
        }
        async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError> {
            let catalog = self.catalog.lock().unwrap();
            catalog
                .get(cookbook_name)
                .map(|ds| ds.iter().map(|d| d.version.clone()).collect())
                .ok_or_else(|| AdapterError::NotFound {
                    name: cookbook_name.to_string(),
                    source: self.label.clone(),
                })
        }
        async fn fetch_descriptor(
            &self,
            cookbook_name: &str,
            version: &Version,
        ) -> Result<CookbookDescriptor, AdapterError> {
            let catalog = self.catalog.lock().unwrap();
            catalog
                .get(cookbook_name)
                .and_then(|ds| ds.iter().find(|d| &d.version == version))
                .cloned()
                .ok_or_else(|| AdapterError::VersionNotFound {
                    name: cookbook_name.to_string(),
                    source: self.label.clone(),
                })
        }
        async fn download_and_extract(
            &self,
            _descriptor: &CookbookDescriptor,
            destination: &std::path::Path,
        ) -> Result<std::path::PathBuf, AdapterError> {
            Ok(destination.to_path_buf())
        }
    }

    fn fake_with(catalog: Map<String, Vec<CookbookDescriptor>>) -> Box<dyn SourceAdapter> {
        Box::new(FakeAdapter {
            label: "fake".to_string(),
            priority: 100,
            catalog: Mutex::new(catalog),
        })
    }

    #[tokio::test]
    async fn resolves_simple_requirement() {
        let mut catalog = Map::new();
        catalog.insert(
            "nginx".to_string(),
            vec![CookbookDescriptor::new(
                "nginx",
                Version::new(2, 7, 6),
                SourceLocation::supermarket("fake"),
            )],
        );
        let adapters = vec![fake_with(catalog)];

        let mut manifest = Manifest::default();
        manifest.cookbooks.push(Requirement::new(
            "nginx",
            ConstraintSet::parse("~> 2.7").unwrap(),
        ));

        let resolution = resolve(&manifest, &adapters).await;
        assert!(resolution.is_ok());
        assert_eq!(
            resolution.cookbooks["nginx"].version,
            Version::new(2, 7, 6)
        );
    }

    #[tokio::test]
    async fn diamond_with_compatible_constraints_resolves() {
        let mut catalog = Map::new();
        catalog.insert(
            "a".to_string(),
            vec![CookbookDescriptor::new("a", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
                .with_dependency("shared", Constraint::parse(">= 2.0").unwrap())],
        );
        catalog.insert(
            "b".to_string(),
            vec![CookbookDescriptor::new("b", Version::new(1, 0, 0), SourceLocation::supermarket("fake"))
                .with_dependency("shared", Constraint::parse("~> 2.2").unwrap())],
        );
        catalog.insert(
            "shared".to_string(),
            vec![
                CookbookDescriptor::new("shared", Version::new(2, 2, 0), SourceLocation::supermarket("fake")),
                CookbookDescriptor::new("shared", Version::new(3, 0, 0), SourceLocation::supermarket("fake")),
            ],
        );
        let adapters = vec![fake_with(catalog)];

        let mut manifest = Manifest::default();
        manifest.cookbooks.push(Requirement::new("a", ConstraintSet::parse(">= 1.0.0").unwrap()));
        manifest.cookbooks.push(Requirement::new("b", ConstraintSet::parse(">= 1.0.0").unwrap()));

        let resolution = resolve(&manifest, &adapters).await;
        assert!(resolution.is_ok(), "errors: {:?}", resolution.errors);
        assert_eq!(resolution.cookbooks["shared"].version, Version::new(2, 2, 0));
    }

    #[tokio::test]
    async fn reports_unsatisfiable_constraint() {
        let mut catalog = Map::new();
        catalog.insert(
            "nginx".to_string(),
            vec![CookbookDescriptor::new(
                "nginx",
                Version::new(1, 0, 0),
                SourceLocation::supermarket("fake"),
            )],
        );
        let adapters = vec![fake_with(catalog)];

        let mut manifest = Manifest::default();
        manifest.cookbooks.push(Requirement::new(
            "nginx",
            ConstraintSet::parse(">= 2.0.0").unwrap(),
        ));

        let resolution = resolve(&manifest, &adapters).await;
        assert!(!resolution.is_ok());
    }
}
