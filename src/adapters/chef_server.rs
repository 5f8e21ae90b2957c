//! Chef-server source adapter.
//!
//! Restricted to pre-authorized download URLs the way Supermarket's API
//! returns them; raw per-file REST endpoints that require request signing
//! are not implemented (see `SPEC_FULL.md` §9).

use super::{AdapterError, PRIORITY_CHEF_SERVER, SourceAdapter};
use crate::descriptor::CookbookDescriptor;
use crate::manifest::SourceLocation;
use crate::version::{Constraint, Version};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CookbookManifest {
    version: String,
    #[serde(default)]
    metadata: CookbookManifestMeta,
    #[serde(default)]
    all_files: Vec<ManifestFile>,
}

#[derive(Debug, Default, Deserialize)]
struct CookbookManifestMeta {
    #[serde(default)]
    dependencies: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    path: String,
    url: String,
}

pub struct ChefServerAdapter {
    base_url: String,
    client: reqwest::Client,
    user_id: String,
}

impl ChefServerAdapter {
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be built.
    #[must_use]
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client with default TLS backend always builds");
        Self {
            base_url: base_url.into(),
            client,
            user_id: user_id.into(),
        }
    }

    fn manifest_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/cookbooks/{name}/{version}",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SourceAdapter for ChefServerAdapter {
    fn name(&self) -> String {
        self.base_url.clone()
    }

    fn priority(&self) -> u8 {
        PRIORITY_CHEF_SERVER
    }

    fn source_location(&self) -> SourceLocation {
        SourceLocation::chef_server(self.base_url.clone())
    }

    async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError> {
        let url = format!(
            "{}/cookbooks/{cookbook_name}",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .header("X-Ops-Userid", &self.user_id)
            .send()
            .await
            .map_err(|e| AdapterError::Network {
                source: self.name(),
                message: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound {
                name: cookbook_name.to_string(),
                source: self.name(),
            });
        }

        let versions: HashMap<String, serde_json::Value> =
            response.json().await.map_err(|e| AdapterError::Malformed {
                source: self.name(),
                message: e.to_string(),
            })?;

        versions
            .keys()
            .map(|v| {
                Version::parse(v).map_err(|e| AdapterError::Malformed {
                    source: self.name(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    async fn fetch_descriptor(
        &self,
        cookbook_name: &str,
        version: &Version,
    ) -> Result<CookbookDescriptor, AdapterError> {
        let url = self.manifest_url(cookbook_name, &version.to_string());
        let response = self
            .client
            .get(&url)
            .header("X-Ops-Userid", &self.user_id)
            .send()
            .await
            .map_err(|e| AdapterError::Network {
                source: self.name(),
                message: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::VersionNotFound {
                name: cookbook_name.to_string(),
                source: self.name(),
            });
        }

        let manifest: CookbookManifest = response.json().await.map_err(|e| AdapterError::Malformed {
            source: self.name(),
            message: e.to_string(),
        })?;

        let mut descriptor =
            CookbookDescriptor::new(cookbook_name, version.clone(), self.source_location());
        for (dep_name, constraint_str) in manifest.metadata.dependencies {
            let constraint = Constraint::parse(&constraint_str).map_err(|e| AdapterError::Malformed {
                source: self.name(),
                message: e.to_string(),
            })?;
            descriptor = descriptor.with_dependency(dep_name, constraint);
        }
        descriptor
            .metadata
            .insert("manifest_url".to_string(), url);
        descriptor
            .metadata
            .insert("file_count".to_string(), manifest.all_files.len().to_string());

        Ok(descriptor)
    }

    async fn download_and_extract(
        &self,
        descriptor: &CookbookDescriptor,
        destination: &Path,
    ) -> Result<PathBuf, AdapterError> {
        let manifest_url = descriptor
            .metadata
            .get("manifest_url")
            .cloned()
            .ok_or_else(|| AdapterError::Malformed {
                source: self.name(),
                message: format!("{} has no cached manifest URL", descriptor.name),
            })?;

        let response = self
            .client
            .get(&manifest_url)
            .header("X-Ops-Userid", &self.user_id)
            .send()
            .await
            .map_err(|e| AdapterError::Network {
                source: self.name(),
                message: e.to_string(),
            })?;

        let manifest: CookbookManifest = response.json().await.map_err(|e| AdapterError::Malformed {
            source: self.name(),
            message: e.to_string(),
        })?;

        let extract_to = destination.join(format!("{}-{}", descriptor.name, descriptor.version));
        std::fs::create_dir_all(&extract_to).map_err(|e| AdapterError::Io {
            source: self.name(),
            source_error: e,
        })?;

        for file in manifest.all_files {
            // Each `file.url` is a pre-authorized, directly fetchable link
            // already signed by the server's manifest response.
            let bytes = self
                .client
                .get(&file.url)
                .send()
                .await
                .map_err(|e| AdapterError::Network {
                    source: self.name(),
                    message: e.to_string(),
                })?
                .bytes()
                .await
                .map_err(|e| AdapterError::Network {
                    source: self.name(),
                    message: e.to_string(),
                })?;

            let target = extract_to.join(&file.path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| AdapterError::Io {
                    source: self.name(),
                    source_error: e,
                })?;
            }
            std::fs::write(&target, &bytes).map_err(|e| AdapterError::Io {
                source: self.name(),
                source_error: e,
            })?;
        }

        Ok(extract_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_shape() {
        let adapter = ChefServerAdapter::new("https://chef.example.com/organizations/acme", "larder");
        assert_eq!(
            adapter.manifest_url("nginx", "2.7.6"),
            "https://chef.example.com/organizations/acme/cookbooks/nginx/2.7.6"
        );
    }
}
