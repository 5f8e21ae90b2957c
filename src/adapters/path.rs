//! Local-path source adapter: a single-version cookbook read directly off
//! disk, with no download step.

use super::{AdapterError, PRIORITY_PATH, SourceAdapter};
use crate::descriptor::CookbookDescriptor;
use crate::manifest::SourceLocation;
use crate::version::Version;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct PathAdapter {
    local_path: PathBuf,
}

impl PathAdapter {
    #[must_use]
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
        }
    }

    fn read_descriptor(&self, cookbook_name: &str) -> Result<CookbookDescriptor, AdapterError> {
        crate::path_metadata::read_descriptor(
            &self.local_path,
            cookbook_name,
            Version::new(0, 0, 0),
            self.source_location(),
        )
        .map_err(|e| AdapterError::Malformed {
            source: self.name(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for PathAdapter {
    fn name(&self) -> String {
        self.local_path.to_string_lossy().to_string()
    }

    fn priority(&self) -> u8 {
        PRIORITY_PATH
    }

    fn source_location(&self) -> SourceLocation {
        SourceLocation::path(self.local_path.to_string_lossy().to_string())
    }

    async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError> {
        Ok(vec![self.read_descriptor(cookbook_name)?.version])
    }

    async fn fetch_descriptor(
        &self,
        cookbook_name: &str,
        version: &Version,
    ) -> Result<CookbookDescriptor, AdapterError> {
        let descriptor = self.read_descriptor(cookbook_name)?;
        if &descriptor.version != version {
            return Err(AdapterError::VersionNotFound {
                name: cookbook_name.to_string(),
                source: self.name(),
            });
        }
        Ok(descriptor)
    }

    async fn download_and_extract(
        &self,
        _descriptor: &CookbookDescriptor,
        _destination: &Path,
    ) -> Result<PathBuf, AdapterError> {
        Ok(self.local_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_location_is_path_kind() {
        let adapter = PathAdapter::new("/tmp/cookbooks/nginx");
        assert_eq!(adapter.source_location().kind, crate::manifest::SourceKind::Path);
    }
}
