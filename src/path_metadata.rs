//! Shared metadata reader for local-checkout sources (path and git
//! adapters): looks for `metadata.json`, falling back to a hand-rolled
//! line extractor over `metadata.rb` for name/version/description/
//! maintainer/license/depends lines.

use crate::descriptor::CookbookDescriptor;
use crate::manifest::SourceLocation;
use crate::version::{Constraint, Version};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("{0} has no metadata.json or metadata.rb")]
    Missing(String),

    #[error("{0}'s metadata.json is malformed: {1}")]
    MalformedJson(String, serde_json::Error),

    #[error("{0}'s metadata.rb is missing a version")]
    MissingVersion(String),
}

#[derive(Debug, Deserialize)]
struct MetadataJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    dependencies: std::collections::HashMap<String, String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    maintainer: Option<String>,
    #[serde(default)]
    license: Option<String>,
}

/// Read a cookbook's descriptor from a checked-out directory, preferring
/// `metadata.json` and falling back to `metadata.rb`.
///
/// # Errors
///
/// Returns [`MetadataError`] if neither file is present or parseable.
pub fn read_descriptor(
    checkout_path: &Path,
    expected_name: &str,
    requested_version: Version,
    source: SourceLocation,
) -> Result<CookbookDescriptor, MetadataError> {
    let json_path = checkout_path.join("metadata.json");
    let rb_path = checkout_path.join("metadata.rb");

    if json_path.exists() {
        return read_json(&json_path, expected_name, source);
    }
    if rb_path.exists() {
        return read_rb(&rb_path, expected_name, requested_version, source);
    }

    Err(MetadataError::Missing(expected_name.to_string()))
}

fn read_json(
    path: &Path,
    expected_name: &str,
    source: SourceLocation,
) -> Result<CookbookDescriptor, MetadataError> {
    let bytes = std::fs::read(path).map_err(|_| MetadataError::Missing(expected_name.to_string()))?;
    let meta: MetadataJson = serde_json::from_slice(&bytes)
        .map_err(|e| MetadataError::MalformedJson(expected_name.to_string(), e))?;

    let name = meta.name.unwrap_or_else(|| expected_name.to_string());
    let version_str = meta
        .version
        .ok_or_else(|| MetadataError::MissingVersion(expected_name.to_string()))?;
    let version =
        Version::parse(&version_str).map_err(|_| MetadataError::MissingVersion(expected_name.to_string()))?;

    let mut descriptor = CookbookDescriptor::new(name, version, source);
    for (dep_name, constraint_str) in meta.dependencies {
        if let Ok(constraint) = Constraint::parse(&constraint_str) {
            descriptor = descriptor.with_dependency(dep_name, constraint);
        }
    }
    if let Some(description) = meta.description {
        descriptor.metadata.insert("description".to_string(), description);
    }
    if let Some(maintainer) = meta.maintainer {
        descriptor.metadata.insert("maintainer".to_string(), maintainer);
    }
    if let Some(license) = meta.license {
        descriptor.metadata.insert("license".to_string(), license);
    }
    Ok(descriptor)
}

fn read_rb(
    path: &Path,
    expected_name: &str,
    requested_version: Version,
    source: SourceLocation,
) -> Result<CookbookDescriptor, MetadataError> {
    let text = std::fs::read_to_string(path).map_err(|_| MetadataError::Missing(expected_name.to_string()))?;

    let mut name = None;
    let mut version = None;
    let mut description = None;
    let mut maintainer = None;
    let mut license = None;
    let mut depends = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("name ") {
            name = extract_string_literal(rest);
        } else if let Some(rest) = line.strip_prefix("version ") {
            version = extract_string_literal(rest);
        } else if let Some(rest) = line.strip_prefix("description ") {
            description = extract_string_literal(rest);
        } else if let Some(rest) = line.strip_prefix("maintainer ") {
            maintainer = extract_string_literal(rest);
        } else if let Some(rest) = line.strip_prefix("license ") {
            license = extract_string_literal(rest);
        } else if let Some(rest) = line.strip_prefix("depends ") {
            let parts: Vec<&str> = rest.splitn(2, ',').collect();
            if let Some(dep_name) = parts.first().and_then(|s| extract_string_literal(s)) {
                let constraint_str = parts.get(1).and_then(|s| extract_string_literal(s)).unwrap_or_default();
                depends.push((dep_name, constraint_str));
            }
        }
    }

    let name = name.unwrap_or_else(|| expected_name.to_string());
    let version = version
        .as_deref()
        .map(Version::parse)
        .transpose()
        .map_err(|_| MetadataError::MissingVersion(expected_name.to_string()))?
        .unwrap_or(requested_version);

    let mut descriptor = CookbookDescriptor::new(name, version, source);
    for (dep_name, constraint_str) in depends {
        if let Ok(constraint) = Constraint::parse(&constraint_str) {
            descriptor = descriptor.with_dependency(dep_name, constraint);
        }
    }
    if let Some(description) = description {
        descriptor.metadata.insert("description".to_string(), description);
    }
    if let Some(maintainer) = maintainer {
        descriptor.metadata.insert("maintainer".to_string(), maintainer);
    }
    if let Some(license) = license {
        descriptor.metadata.insert("license".to_string(), license);
    }
    Ok(descriptor)
}

/// Extract a `'...'`/`"..."` literal from the tail of a `key 'value'` line.
fn extract_string_literal(rest: &str) -> Option<String> {
    let rest = rest.trim();
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let body = rest.get(1..)?;
    let end = body.find(quote)?;
    body.get(..end).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_literal() {
        assert_eq!(extract_string_literal("'nginx'"), Some("nginx".to_string()));
        assert_eq!(extract_string_literal("\"2.7.6\""), Some("2.7.6".to_string()));
    }

    #[test]
    fn reads_metadata_rb() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("metadata.rb"),
            "name 'nginx'\nversion '2.7.6'\ndepends 'apt', '>= 1.0.0'\n",
        )
        .unwrap();

        let descriptor = read_descriptor(
            dir.path(),
            "nginx",
            Version::new(0, 0, 0),
            SourceLocation::path(dir.path().to_string_lossy().to_string()),
        )
        .unwrap();

        assert_eq!(descriptor.name, "nginx");
        assert_eq!(descriptor.version, Version::new(2, 7, 6));
        assert!(descriptor.dependencies.contains_key("apt"));
    }
}
