//! Larder internal library code: Chef/Berkshelf-compatible cookbook
//! dependency resolution, caching, and locking.

/// Default Chef Supermarket API URL, used when a manifest declares no
/// explicit `source`.
pub const DEFAULT_SUPERMARKET_URL: &str = "https://supermarket.chef.io";

pub mod adapters;
pub mod backtrack;
pub mod berksfile;
pub mod cache;
pub mod commands;
pub mod config;
pub mod debug;
pub mod descriptor;
pub mod env_vars;
pub mod error;
pub mod git;
pub mod graph;
pub mod lockfile;
pub mod manifest;
pub mod path_metadata;
pub mod paths;
pub mod policyfile;
pub mod resolver;
pub mod version;

// Re-export common types for convenience
pub use cache::{Cache, CacheEntry, CacheError, Stats as CacheStats, human_bytes};
pub use config::{Config, ConfigError};
pub use debug::{debug_log, debug_logf, init_debug, is_debug_enabled};
pub use descriptor::CookbookDescriptor;
pub use error::{LarderError, render_error};
pub use git::{GitError, GitManager};
pub use graph::{DependencyGraph, GraphError};
pub use lockfile::{LockFile, LockfileError};
pub use manifest::{Manifest, ParseError, Requirement, SourceLocation};
pub use paths::{ManifestKind, ManifestPaths, find_manifest};
pub use resolver::{Resolution, ResolvedCookbook, ResolverError, resolve};
pub use version::{Constraint, ConstraintSet, Version, VersionError};
