//! One module per CLI subcommand, each exposing an async `run()`,
//! mirroring the teacher's `commands/*.rs` convention.

pub mod cache;
pub mod info;
pub mod install;
pub mod search;
pub mod update;

use crate::adapters::{self, SourceAdapter};
use crate::config::Config;
use crate::manifest::{Manifest, SourceLocation};
use crate::paths::{ManifestKind, ManifestPaths};

/// Build the adapter chain for a manifest: one `SupermarketAdapter` per
/// declared `source` (falling back to the configured default sources when
/// the manifest declares none), plus one git/path/chef-server adapter for
/// every cookbook requirement that overrides its source.
#[must_use]
pub fn build_adapters(manifest: &Manifest, config: &Config) -> Vec<Box<dyn SourceAdapter>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();

    let supermarket_sources: Vec<SourceLocation> = if manifest.sources.is_empty() {
        config
            .default_sources
            .iter()
            .map(|url| SourceLocation::supermarket(url.clone()))
            .collect()
    } else {
        manifest.sources.iter().filter(|s| s.url.is_some()).cloned().collect()
    };

    for source in supermarket_sources {
        let Some(url) = source.url else { continue };
        let api_key = source.options.get("api_key").cloned();
        adapters.push(Box::new(
            adapters::supermarket::SupermarketAdapter::new(url).with_api_key(api_key),
        ));
    }

    let git_cache = crate::paths::git_cache_dir(&config.cache_path);
    for requirement in manifest.all_requirements() {
        let Some(source) = &requirement.source else {
            continue;
        };
        match &source.kind {
            crate::manifest::SourceKind::Git => {
                let Some(url) = &source.url else { continue };
                // Berksfile/Policyfile grammar collapses branch:/tag:/ref:
                // into the single `git_ref` field at parse time, so there's
                // nothing left to distinguish here; revision isn't a
                // supported keyword.
                if let Ok(adapter) = adapters::git::GitAdapter::new(
                    git_cache.clone(),
                    url.clone(),
                    None,
                    source.git_ref.clone(),
                    None,
                    None,
                ) {
                    adapters.push(Box::new(adapter));
                }
            }
            crate::manifest::SourceKind::Path => {
                if let Some(path) = &source.local_path {
                    adapters.push(Box::new(adapters::path::PathAdapter::new(path.clone())));
                }
            }
            crate::manifest::SourceKind::ChefServer => {
                if let Some(url) = &source.url {
                    let user_id = source
                        .options
                        .get("client_name")
                        .cloned()
                        .or_else(crate::env_vars::chef_node_name)
                        .unwrap_or_default();
                    adapters.push(Box::new(adapters::chef_server::ChefServerAdapter::new(
                        url.clone(),
                        user_id,
                    )));
                }
            }
            crate::manifest::SourceKind::Supermarket => {}
        }
    }

    adapters
}

/// Locate and parse the manifest, starting from the current directory.
///
/// # Errors
///
/// Returns [`crate::error::LarderError`] if no manifest is found or it
/// fails to parse.
pub fn load_manifest(
    working_dir: &std::path::Path,
) -> Result<(ManifestPaths, Manifest), crate::error::LarderError> {
    let paths = crate::paths::find_manifest(working_dir).ok_or_else(|| {
        crate::error::LarderError::validation("no Berksfile or Policyfile.rb found")
            .with_suggestion("run this command from a directory containing a Berksfile")
    })?;

    let text = std::fs::read_to_string(&paths.manifest).map_err(|e| {
        crate::error::LarderError::filesystem(
            format!("failed to read {}", paths.manifest.display()),
            e,
        )
    })?;

    let manifest = match paths.kind {
        ManifestKind::Berksfile => crate::berksfile::parse(&text)?,
        ManifestKind::Policyfile => crate::policyfile::parse(&text)?,
    };

    Ok((paths, manifest))
}

/// Filter a manifest's top-level cookbooks (and group membership) by
/// `--only`/`--except` group name lists.
#[must_use]
pub fn filter_groups(manifest: &Manifest, only: &[String], except: &[String]) -> Manifest {
    if only.is_empty() && except.is_empty() {
        return manifest.clone();
    }

    let mut filtered = manifest.clone();
    filtered.groups.retain(|name, _| {
        let keep_only = only.is_empty() || only.iter().any(|o| o == name);
        let drop_except = except.iter().any(|e| e == name);
        keep_only && !drop_except
    });
    filtered
}

#[must_use]
pub fn default_source_location() -> SourceLocation {
    SourceLocation::supermarket(crate::DEFAULT_SUPERMARKET_URL)
}
