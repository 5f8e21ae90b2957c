//! Shared fixtures for the end-to-end integration tests: an in-memory
//! `SourceAdapter` backed by a fixed catalog, so these tests exercise the
//! resolver/backtracking/cache pipeline without touching the network.

use larder::adapters::{AdapterError, SourceAdapter};
use larder::descriptor::CookbookDescriptor;
use larder::manifest::SourceLocation;
use larder::version::Version;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct FakeAdapter {
    pub label: String,
    pub priority: u8,
    pub catalog: Mutex<HashMap<String, Vec<CookbookDescriptor>>>,
}

impl FakeAdapter {
    pub fn new(label: &str, priority: u8, catalog: HashMap<String, Vec<CookbookDescriptor>>) -> Box<dyn SourceAdapter> {
        Box::new(Self {
            label: label.to_string(),
            priority,
            catalog: Mutex::new(catalog),
        })
    }
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
        let catalog = self.catalog.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
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
        let catalog = self.catalog.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
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
