//! `DependencyGraph`: an arena-allocated dependency graph keyed by
//! cookbook name, with O(1) lookup by name or node id.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Integer identifier for a node in a [`DependencyGraph`]'s arena.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("cookbook '{0}' is not in the graph")]
    UnknownCookbook(String),

    #[error("dependency cycle detected: {0}")]
    Cycle(String),
}

/// An arena-allocated dependency graph. Nodes are never removed once
/// added, so ids remain stable for the lifetime of a resolution.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    edges: HashMap<NodeId, HashSet<NodeId>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cookbook node, returning its id. Re-adding an existing
    /// name updates its version and returns the existing id.
    pub fn add_cookbook(&mut self, name: impl Into<String>, version: impl Into<String>) -> NodeId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            if let Some(node) = self.nodes.get_mut(id) {
                node.version = version.into();
            }
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.clone(),
            version: version.into(),
        });
        self.by_name.insert(name, id);
        self.edges.insert(id, HashSet::new());
        id
    }

    /// # Errors
    ///
    /// Returns [`GraphError::UnknownCookbook`] if either endpoint hasn't
    /// been added yet.
    pub fn add_dependency(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if from >= self.nodes.len() {
            return Err(GraphError::UnknownCookbook(from.to_string()));
        }
        if to >= self.nodes.len() {
            return Err(GraphError::UnknownCookbook(to.to_string()));
        }
        self.edges.entry(from).or_default().insert(to);
        Ok(())
    }

    #[must_use]
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn dependencies_of(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_cycles(&self) -> bool {
        self.topological_sort().is_err()
    }

    /// Kahn's algorithm; ties broken by ascending node id for determinism.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] naming one cookbook on the cycle if
    /// the graph is not a DAG.
    pub fn topological_sort(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for deps in self.edges.values() {
            for &to in deps {
                in_degree[to] += 1;
            }
        }

        let mut queue: Vec<NodeId> = (0..self.nodes.len())
            .filter(|&id| in_degree[id] == 0)
            .collect();
        queue.sort_unstable();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut i = 0;
        while let Some(&id) = queue.get(i) {
            i += 1;
            order.push(id);
            let mut newly_free = Vec::new();
            for &to in self.edges.get(&id).into_iter().flatten() {
                if let Some(count) = in_degree.get_mut(to) {
                    *count -= 1;
                    if *count == 0 {
                        newly_free.push(to);
                    }
                }
            }
            newly_free.sort_unstable();
            queue.extend(newly_free);
        }

        if order.len() != self.nodes.len() {
            let stuck = (0..self.nodes.len())
                .find(|&id| in_degree.get(id).copied().unwrap_or(0) > 0)
                .and_then(|id| self.nodes.get(id))
                .map(|node| node.name.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_sort_orders_dependency_before_dependent() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_cookbook("app", "1.0.0");
        let lib = graph.add_cookbook("lib", "1.0.0");
        graph.add_dependency(app, lib).unwrap();

        let order = graph.topological_sort().unwrap();
        let app_pos = order.iter().position(|&id| id == app).unwrap();
        let lib_pos = order.iter().position(|&id| id == lib).unwrap();
        assert!(lib_pos < app_pos);
    }

    #[test]
    fn detects_cycle() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_cookbook("a", "1.0.0");
        let b = graph.add_cookbook("b", "1.0.0");
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(b, a).unwrap();

        assert!(graph.has_cycles());
        assert!(graph.topological_sort().is_err());
    }

    #[test]
    fn re_adding_a_name_updates_version_not_id() {
        let mut graph = DependencyGraph::new();
        let first = graph.add_cookbook("nginx", "1.0.0");
        let second = graph.add_cookbook("nginx", "2.0.0");
        assert_eq!(first, second);
        assert_eq!(graph.node(first).unwrap().version, "2.0.0");
    }
}
