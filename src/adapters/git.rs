//! Git source adapter: clones/fetches a repository and reads
//! `metadata.json`/`metadata.rb` from the checked-out tree.

use super::{AdapterError, PRIORITY_GIT, SourceAdapter};
use crate::descriptor::CookbookDescriptor;
use crate::git::{CheckoutTarget, GitManager, resolve_checkout_target};
use crate::manifest::SourceLocation;
use crate::version::Version;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct GitAdapter {
    repository_url: String,
    revision: Option<String>,
    git_ref: Option<String>,
    tag: Option<String>,
    branch: Option<String>,
    manager: Mutex<GitManager>,
}

impl GitAdapter {
    /// # Errors
    ///
    /// Returns [`AdapterError::Io`] if the clone cache directory cannot be
    /// created.
    pub fn new(
        cache_dir: PathBuf,
        repository_url: impl Into<String>,
        revision: Option<String>,
        git_ref: Option<String>,
        tag: Option<String>,
        branch: Option<String>,
    ) -> Result<Self, AdapterError> {
        let manager = GitManager::new(cache_dir).map_err(|e| AdapterError::Io {
            source: "git cache".to_string(),
            source_error: std::io::Error::other(e.to_string()),
        })?;
        Ok(Self {
            repository_url: repository_url.into(),
            revision,
            git_ref,
            tag,
            branch,
            manager: Mutex::new(manager),
        })
    }

    fn checkout_target(&self) -> CheckoutTarget {
        resolve_checkout_target(
            self.revision.as_deref(),
            self.git_ref.as_deref(),
            self.tag.as_deref(),
            self.branch.as_deref(),
        )
    }

    fn checkout(&self) -> Result<PathBuf, AdapterError> {
        let manager = self.manager.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        manager
            .checkout(&self.repository_url, &self.checkout_target())
            .map_err(|e| AdapterError::Network {
                source: self.repository_url.clone(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SourceAdapter for GitAdapter {
    fn name(&self) -> String {
        self.repository_url.clone()
    }

    fn priority(&self) -> u8 {
        PRIORITY_GIT
    }

    fn source_location(&self) -> SourceLocation {
        let mut loc = SourceLocation::git(self.repository_url.clone());
        loc.git_ref = self
            .revision
            .clone()
            .or_else(|| self.git_ref.clone())
            .or_else(|| self.tag.clone())
            .or_else(|| self.branch.clone());
        loc
    }

    async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError> {
        self.checkout()?;
        let manager = self.manager.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        manager
            .tag_versions(&self.repository_url)
            .map_err(|e| AdapterError::Network {
                source: self.repository_url.clone(),
                message: e.to_string(),
            })
            .inspect(|versions| {
                if versions.is_empty() {
                    crate::debug_log(&format!("no tags found for {cookbook_name}, using 0.0.0"));
                }
            })
    }

    async fn fetch_descriptor(
        &self,
        cookbook_name: &str,
        version: &Version,
    ) -> Result<CookbookDescriptor, AdapterError> {
        let checkout_path = self.checkout()?;
        crate::path_metadata::read_descriptor(&checkout_path, cookbook_name, version.clone(), self.source_location())
            .map_err(|e| AdapterError::Malformed {
                source: self.repository_url.clone(),
                message: e.to_string(),
            })
    }

    async fn download_and_extract(
        &self,
        descriptor: &CookbookDescriptor,
        _destination: &Path,
    ) -> Result<PathBuf, AdapterError> {
        let _ = descriptor;
        self.checkout()
    }
}
