//! Supermarket-compatible REST source adapter.
//!
//! Talks to `GET /api/v1/cookbooks/<name>` (version list + metadata) and
//! downloads the tarball URL the API returns, which is already
//! pre-authorized and needs no request signing.

use super::{AdapterError, PRIORITY_SUPERMARKET, SourceAdapter};
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
struct CookbookIndex {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CookbookVersion {
    version: String,
    #[serde(default)]
    dependencies: HashMap<String, String>,
    #[serde(default)]
    file: Option<String>,
}

/// Sort descending and drop exact duplicates, since the raw API response
/// carries no ordering guarantee.
fn sort_and_dedup_versions(mut versions: Vec<Version>) -> Vec<Version> {
    versions.sort_by(|a, b| b.compare(a));
    versions.dedup();
    versions
}

pub struct SupermarketAdapter {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SupermarketAdapter {
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be built, which only
    /// happens under a broken TLS backend configuration.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("larder/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client with default TLS backend always builds");
        Self {
            base_url: base_url.into(),
            client,
            api_key: None,
        }
    }

    /// Attach an API key, sent as the `X-Ops-Userid` header on every
    /// request, for Supermarket instances that require one.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn apply_api_key(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-Ops-Userid", key),
            None => builder,
        }
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/api/v1/cookbooks/{name}", self.base_url.trim_end_matches('/'))
    }

    fn version_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/api/v1/cookbooks/{name}/versions/{version}",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SourceAdapter for SupermarketAdapter {
    fn name(&self) -> String {
        self.base_url.clone()
    }

    fn priority(&self) -> u8 {
        PRIORITY_SUPERMARKET
    }

    fn source_location(&self) -> SourceLocation {
        SourceLocation::supermarket(self.base_url.clone())
    }

    async fn list_versions(&self, cookbook_name: &str) -> Result<Vec<Version>, AdapterError> {
        let url = self.index_url(cookbook_name);
        let response = self
            .apply_api_key(self.client.get(&url))
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

        let index: CookbookIndex = response.json().await.map_err(|e| AdapterError::Malformed {
            source: self.name(),
            message: e.to_string(),
        })?;

        let versions = index
            .versions
            .iter()
            .map(|url| {
                // Versioned URLs end in `.../versions/<version>`.
                let raw = url.rsplit('/').next().unwrap_or(url);
                Version::parse(raw).map_err(|e| AdapterError::Malformed {
                    source: self.name(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<Version>, AdapterError>>()?;

        Ok(sort_and_dedup_versions(versions))
    }

    async fn fetch_descriptor(
        &self,
        cookbook_name: &str,
        version: &Version,
    ) -> Result<CookbookDescriptor, AdapterError> {
        let url = self.version_url(cookbook_name, &version.to_string());
        let response = self
            .apply_api_key(self.client.get(&url))
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

        let body: CookbookVersion = response.json().await.map_err(|e| AdapterError::Malformed {
            source: self.name(),
            message: e.to_string(),
        })?;

        let mut descriptor =
            CookbookDescriptor::new(cookbook_name, version.clone(), self.source_location());

        for (dep_name, constraint_str) in body.dependencies {
            let constraint = Constraint::parse(&constraint_str).map_err(|e| AdapterError::Malformed {
                source: self.name(),
                message: e.to_string(),
            })?;
            descriptor = descriptor.with_dependency(dep_name, constraint);
        }

        if let Some(file) = body.file {
            descriptor = descriptor.with_tarball_url(file);
        }

        Ok(descriptor)
    }

    async fn download_and_extract(
        &self,
        descriptor: &CookbookDescriptor,
        destination: &Path,
    ) -> Result<PathBuf, AdapterError> {
        let Some(tarball_url) = &descriptor.tarball_url else {
            return Err(AdapterError::Malformed {
                source: self.name(),
                message: format!("{} has no tarball URL", descriptor.name),
            });
        };

        let response = self
            .client
            .get(tarball_url)
            .send()
            .await
            .map_err(|e| AdapterError::Network {
                source: self.name(),
                message: e.to_string(),
            })?;

        let bytes = response.bytes().await.map_err(|e| AdapterError::Network {
            source: self.name(),
            message: e.to_string(),
        })?;

        let decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut archive = tar::Archive::new(decoder);

        let extract_to = destination.join(format!("{}-{}", descriptor.name, descriptor.version));
        std::fs::create_dir_all(&extract_to).map_err(|e| AdapterError::Io {
            source: self.name(),
            source_error: e,
        })?;

        // The tarball's top-level directory is `<name>-<version>/`; strip
        // it so extracted files land directly under `extract_to`.
        let entries = archive.entries().map_err(|e| AdapterError::Io {
            source: self.name(),
            source_error: e,
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| AdapterError::Io {
                source: self.name(),
                source_error: e,
            })?;
            let path = entry.path().map_err(|e| AdapterError::Io {
                source: self.name(),
                source_error: e,
            })?;
            let stripped = path.components().skip(1).collect::<PathBuf>();
            if stripped.as_os_str().is_empty() {
                continue;
            }
            let target = extract_to.join(&stripped);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| AdapterError::Io {
                    source: self.name(),
                    source_error: e,
                })?;
            }
            entry.unpack(&target).map_err(|e| AdapterError::Io {
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
    fn index_and_version_urls() {
        let adapter = SupermarketAdapter::new("https://supermarket.chef.io");
        assert_eq!(
            adapter.index_url("nginx"),
            "https://supermarket.chef.io/api/v1/cookbooks/nginx"
        );
        assert_eq!(
            adapter.version_url("nginx", "2.7.6"),
            "https://supermarket.chef.io/api/v1/cookbooks/nginx/versions/2.7.6"
        );
    }

    #[test]
    fn sorts_descending_and_drops_duplicates() {
        let versions = vec![
            Version::new(1, 0, 0),
            Version::new(2, 7, 6),
            Version::new(1, 0, 0),
            Version::new(2, 0, 0),
        ];
        assert_eq!(
            sort_and_dedup_versions(versions),
            vec![Version::new(2, 7, 6), Version::new(2, 0, 0), Version::new(1, 0, 0)]
        );
    }

    #[test]
    fn api_key_adds_the_ops_userid_header() {
        let adapter = SupermarketAdapter::new("https://supermarket.chef.io")
            .with_api_key(Some("u1".to_string()));
        let request = adapter
            .apply_api_key(adapter.client.get("https://supermarket.chef.io/"))
            .build()
            .unwrap();
        assert_eq!(request.headers().get("X-Ops-Userid").unwrap(), "u1");
    }

    #[test]
    fn no_api_key_omits_the_header() {
        let adapter = SupermarketAdapter::new("https://supermarket.chef.io");
        let request = adapter
            .apply_api_key(adapter.client.get("https://supermarket.chef.io/"))
            .build()
            .unwrap();
        assert!(request.headers().get("X-Ops-Userid").is_none());
    }
}
