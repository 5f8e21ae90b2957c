//! Source adapters: the uniform contract each of supermarket, chef-server,
//! git, and path sources implements so the resolver can treat them
//! interchangeably.

pub mod chef_server;
pub mod git;
pub mod path;
pub mod supermarket;

use crate::descriptor::CookbookDescriptor;
use crate::manifest::SourceLocation;
use crate::version::Version;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("'{name}' not found in {source}")]
    NotFound { name: String, source: String },

    #[error("no version of '{name}' in {source} satisfies the requirement")]
    VersionNotFound { name: String, source: String },

    #[error("network error talking to {source}: {message}")]
    Network { source: String, message: String },

    #[error("I/O error reading {source}: {source_error}")]
    Io {
        source: String,
        #[source]
        source_error: std::io::Error,
    },

    #[error("malformed response from {source}: {message}")]
    Malformed { source: String, message: String },
}

/// Default adapter priority, used to break ties when more than one source
/// can satisfy the same requirement.
pub const PRIORITY_PATH: u8 = 200;
pub const PRIORITY_CHEF_SERVER: u8 = 150;
pub const PRIORITY_SUPERMARKET: u8 = 100;
pub const PRIORITY_GIT: u8 = 50;

/// A source of cookbooks: resolves available versions and fetches a
/// specific one's descriptor and (eventually) its archive.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable label used in logs, lockfile source keys, and error messages.
    fn name(&self) -> String;

    /// Priority used to break ties between adapters that both satisfy a
    /// requirement; higher wins.
    fn priority(&self) -> u8;

    /// The [`SourceLocation`] this adapter was built from.
    fn source_location(&self) -> SourceLocation;

    /// List versions of `cookbook_name` this adapter can provide.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if the source cannot be reached or the
    /// cookbook is unknown to it.
    async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError>;

    /// Fetch full dependency metadata for one resolved version.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if the version cannot be found or its
    /// metadata cannot be read.
    async fn fetch_descriptor(
        &self,
        cookbook_name: &str,
        version: &Version,
    ) -> Result<CookbookDescriptor, AdapterError>;

    /// Download (or locate, for path/git sources) the cookbook's contents
    /// on disk, returning the directory containing its files.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if the download or extraction fails.
    async fn download_and_extract(
        &self,
        descriptor: &CookbookDescriptor,
        destination: &std::path::Path,
    ) -> Result<std::path::PathBuf, AdapterError>;
}
