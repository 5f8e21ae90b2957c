//! `CookbookDescriptor`: the metadata a source adapter returns for one
//! resolved `(name, version)` pair before it has been fetched into cache.

use crate::manifest::SourceLocation;
use crate::version::{Constraint, Version};
use std::collections::HashMap;

/// A cookbook's resolved identity and declared dependencies, as reported
/// by whichever source adapter produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookDescriptor {
    pub name: String,
    pub version: Version,
    pub dependencies: HashMap<String, Constraint>,
    pub metadata: HashMap<String, String>,
    pub source: SourceLocation,
    /// Present when the descriptor was read from a local checkout (path or
    /// git source) rather than downloaded as a tarball.
    pub path: Option<String>,
    /// Present when the descriptor names a remote archive to fetch.
    pub tarball_url: Option<String>,
}

impl CookbookDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version, source: SourceLocation) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: HashMap::new(),
            metadata: HashMap::new(),
            source,
            path: None,
            tarball_url: None,
        }
    }

    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>, constraint: Constraint) -> Self {
        self.dependencies.insert(name.into(), constraint);
        self
    }

    #[must_use]
    pub fn with_tarball_url(mut self, url: impl Into<String>) -> Self {
        self.tarball_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_dependencies() {
        let descriptor = CookbookDescriptor::new(
            "nginx",
            Version::new(2, 7, 6),
            SourceLocation::supermarket("https://supermarket.chef.io"),
        )
        .with_dependency("apt", Constraint::parse(">= 1.0.0").unwrap());

        assert_eq!(descriptor.dependencies.len(), 1);
        assert!(descriptor.dependencies.contains_key("apt"));
    }
}
