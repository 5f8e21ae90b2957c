//! Install command
//!
//! Resolve a manifest's cookbooks, download and cache each one, and write
//! the lock file.

use crate::cache::Cache;
use crate::commands::{build_adapters, filter_groups, load_manifest};
use crate::config::Config;
use crate::error::LarderError;
use crate::lockfile::LockFile;
use crate::resolver;
use futures_util::{StreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug)]
pub struct InstallOptions {
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub path: Option<String>,
}

/// Run the install command: resolve the manifest, download every resolved
/// cookbook into the cache, and write the lock file beside the manifest.
pub async fn run(options: InstallOptions, config: &Config) -> Result<(), LarderError> {
    let working_dir = options
        .path
        .as_ref()
        .map_or_else(|| std::env::current_dir().unwrap_or_default(), std::path::PathBuf::from);

    let (paths, manifest) = load_manifest(&working_dir)?;
    let manifest = filter_groups(&manifest, &options.only, &options.except);
    let adapters = build_adapters(&manifest, config);

    let resolution = resolver::resolve(&manifest, &adapters).await;
    if !resolution.is_ok() {
        let mut err = LarderError::resolution("failed to resolve cookbook dependencies");
        for (i, resolver_error) in resolution.errors.iter().enumerate() {
            err = err.with_context(format!("error_{i}"), resolver_error.to_string());
        }
        return Err(err);
    }

    let cache_dir = crate::paths::cookbooks_cache_dir(&config.cache_path);
    let cache = Cache::new(cache_dir, cache_max_size(config), None)
        .map_err(|e| LarderError::filesystem("failed to open cache", e))?;

    let progress = ProgressBar::new(resolution.cookbooks.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let results: Vec<Result<(), LarderError>> = stream::iter(resolution.cookbooks.values())
        .map(|cookbook| {
            let adapters = &adapters;
            let cache = &cache;
            let progress = &progress;
            async move {
                progress.set_message(cookbook.name.clone());
                let adapter = adapters
                    .iter()
                    .find(|a| a.source_location() == cookbook.source_location)
                    .ok_or_else(|| {
                        LarderError::resolution("no adapter available for resolved cookbook")
                    })?;

                let destination = cache
                    .base_dir()
                    .join(&cookbook.name)
                    .join(cookbook.version.to_string());
                adapter
                    .download_and_extract(&cookbook.descriptor, &destination)
                    .await
                    .map_err(|e| {
                        LarderError::network(format!("failed to download {}", cookbook.name), e)
                    })?;

                progress.inc(1);
                Ok(())
            }
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;
    progress.finish_and_clear();

    for result in results {
        result?;
    }

    let generated_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let lockfile = LockFile::from_resolution(&resolution, generated_at);
    lockfile
        .save_json(&paths.lockfile)
        .map_err(|e| LarderError::filesystem("failed to write lock file", e))?;

    println!(
        "Resolved and locked {} cookbook(s) into {}",
        resolution.cookbooks.len(),
        paths.lockfile.display()
    );

    Ok(())
}

fn cache_max_size(config: &Config) -> u64 {
    let _ = config;
    1_000_000_000
}
