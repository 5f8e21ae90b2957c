//! `ConstraintSolver`: a depth-first backtracking resolver used when the
//! default eager resolver reports a conflict on a shared transitive
//! dependency. Tries candidate versions highest-first, snapshotting state
//! before each tentative assignment so a dead end can be undone cleanly.

use crate::adapters::SourceAdapter;
use crate::descriptor::CookbookDescriptor;
use crate::manifest::{Manifest, Requirement};
use crate::version::{ConstraintSet, Version};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SolverError {
    #[error("no solution satisfies the constraints on '{name}': {constraints}")]
    NoSolution { name: String, constraints: String },
}

#[derive(Debug, Clone)]
struct State {
    resolved: HashMap<String, (Version, CookbookDescriptor)>,
    constraints: HashMap<String, ConstraintSet>,
    queue: VecDeque<Requirement>,
}

pub struct ConstraintSolver<'a> {
    adapters: &'a [Box<dyn SourceAdapter>],
}

impl<'a> ConstraintSolver<'a> {
    #[must_use]
    pub fn new(adapters: &'a [Box<dyn SourceAdapter>]) -> Self {
        Self { adapters }
    }

    /// # Errors
    ///
    /// Returns [`SolverError::NoSolution`] naming the first cookbook whose
    /// candidates were all exhausted without finding a consistent
    /// assignment.
    pub async fn solve(
        &self,
        manifest: &Manifest,
    ) -> Result<HashMap<String, (Version, CookbookDescriptor)>, SolverError> {
        let mut constraints = HashMap::new();
        let mut queue = VecDeque::new();
        for requirement in manifest.all_requirements() {
            constraints.insert(requirement.name.clone(), requirement.constraint.clone());
            queue.push_back(requirement.clone());
        }

        let state = State {
            resolved: HashMap::new(),
            constraints,
            queue,
        };

        self.search(state).await
    }

    fn search(
        &self,
        mut state: State,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<HashMap<String, (Version, CookbookDescriptor)>, SolverError>> + Send + '_>> {
        Box::pin(async move {
        let Some(requirement) = state.queue.pop_front() else {
            return Ok(state.resolved);
        };

        if state.resolved.contains_key(&requirement.name) {
            return self.search(state).await;
        }

        let mut candidates = Vec::new();
        for adapter in self.adapters {
            if let Ok(versions) = adapter.list_versions(&requirement.name).await {
                for version in versions {
                    if requirement.constraint.matches(&version) {
                        candidates.push((adapter.as_ref(), version));
                    }
                }
            }
        }
        candidates.sort_by(|a, b| b.1.compare(&a.1));
        candidates.dedup_by(|a, b| a.1 == b.1);

        for (adapter, version) in candidates {
            let Ok(descriptor) = adapter.fetch_descriptor(&requirement.name, &version).await else {
                continue;
            };

            // Snapshot before the tentative assignment; restore on failure
            // rather than mutating `state` in place.
            let mut next = state.clone();
            next.resolved
                .insert(requirement.name.clone(), (version.clone(), descriptor.clone()));

            let mut consistent = true;
            for (dep_name, dep_constraint) in &descriptor.dependencies {
                let dep_set = ConstraintSet::parse(&dep_constraint.to_string())
                    .unwrap_or_else(|_| ConstraintSet::any());

                match next.constraints.get(dep_name) {
                    Some(existing) => {
                        if let Some((resolved_version, _)) = next.resolved.get(dep_name) {
                            if !dep_set.matches(resolved_version) {
                                consistent = false;
                                break;
                            }
                        } else if existing != &dep_set {
                            // Narrow to the intersection by preferring the
                            // newly discovered constraint; re-queue so the
                            // dependency is chosen against both.
                            next.queue.push_back(Requirement::new(dep_name.clone(), dep_set.clone()));
                        }
                    }
                    None => {
                        next.constraints.insert(dep_name.clone(), dep_set.clone());
                        next.queue.push_back(Requirement::new(dep_name.clone(), dep_set));
                    }
                }
            }

            if !consistent {
                continue;
            }

            if let Ok(result) = self.search(next).await {
                return Ok(result);
            }
        }

        Err(SolverError::NoSolution {
            name: requirement.name.clone(),
            constraints: state
                .constraints
                .get(&requirement.name)
                .map(ToString::to_string)
                .unwrap_or_default(),
        })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterError;
    use crate::manifest::SourceLocation;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    struct FakeAdapter {
        catalog: Mutex<Map<String, Vec<CookbookDescriptor>>>,
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn name(&self) -> String {
            "fake".to_string()
        }
        fn priority(&self) -> u8 {
            100
        }
        fn source_location(&self) -> SourceLocation {
            SourceLocation::supermarket("fake")
        }
        async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError> {
            let catalog = self.catalog.lock().unwrap();
            catalog
                .get(cookbook_name)
                .map(|ds| ds.iter().map(|d| d.version.clone()).collect())
                .ok_or_else(|| AdapterError::NotFound {
                    name: cookbook_name.to_string(),
                    source: "fake".to_string(),
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
                    source: "fake".to_string(),
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

    #[tokio::test]
    async fn backtracks_to_a_consistent_solution() {
        // app depends on database (>= 1.0.0) and cache; cache 2.0.0 needs
        // database ~> 2.0, cache 1.0.0 needs database >= 1.0.0 — only
        // cache 1.0.0 + database 2.0.0 (or 1.0.0) is consistent once the
        // solver backs off the newest cache candidate.
        let mut catalog = Map::new();
        catalog.insert(
            "app".to_string(),
            vec![{
                let mut d = CookbookDescriptor::new("app", Version::new(1, 0, 0), SourceLocation::supermarket("fake"));
                d = d.with_dependency("database", crate::version::Constraint::parse(">= 1.0.0").unwrap());
                d = d.with_dependency("cache", crate::version::Constraint::parse(">= 1.0.0").unwrap());
                d
            }],
        );
        catalog.insert(
            "database".to_string(),
            vec![
                CookbookDescriptor::new("database", Version::new(1, 0, 0), SourceLocation::supermarket("fake")),
                CookbookDescriptor::new("database", Version::new(2, 0, 0), SourceLocation::supermarket("fake")),
            ],
        );
        catalog.insert(
            "cache".to_string(),
            vec![
                {
                    let mut d = CookbookDescriptor::new("cache", Version::new(1, 0, 0), SourceLocation::supermarket("fake"));
                    d = d.with_dependency("database", crate::version::Constraint::parse(">= 1.0.0").unwrap());
                    d
                },
                {
                    let mut d = CookbookDescriptor::new("cache", Version::new(2, 0, 0), SourceLocation::supermarket("fake"));
                    d = d.with_dependency("database", crate::version::Constraint::parse("~> 2.0").unwrap());
                    d
                },
            ],
        );

        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FakeAdapter {
            catalog: Mutex::new(catalog),
        })];

        let mut manifest = Manifest::default();
        manifest
            .cookbooks
            .push(Requirement::new("app", ConstraintSet::parse(">= 1.0.0").unwrap()));

        let solver = ConstraintSolver::new(&adapters);
        let solution = solver.solve(&manifest).await.unwrap();

        assert!(solution.contains_key("database"));
        assert!(solution.contains_key("cache"));
    }
}
