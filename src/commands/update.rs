//! Update command
//!
//! Re-resolve all (or the named) cookbooks, ignoring any existing lock
//! file versions, and rewrite the lock.

use crate::commands::{build_adapters, filter_groups, load_manifest};
use crate::config::Config;
use crate::error::LarderError;
use crate::lockfile::LockFile;
use crate::resolver;

#[derive(Debug)]
pub struct UpdateOptions {
    pub cookbooks: Vec<String>,
    pub only: Vec<String>,
    pub except: Vec<String>,
}

/// Run the update command: re-resolve ignoring the lock file's pinned
/// versions, then overwrite it with the fresh resolution.
pub async fn run(options: UpdateOptions, config: &Config) -> Result<(), LarderError> {
    let working_dir = std::env::current_dir().unwrap_or_default();
    let (paths, manifest) = load_manifest(&working_dir)?;
    let manifest = filter_groups(&manifest, &options.only, &options.except);
    let adapters = build_adapters(&manifest, config);

    let resolution = resolver::resolve(&manifest, &adapters).await;
    if !resolution.is_ok() {
        let mut err = LarderError::resolution("failed to re-resolve cookbook dependencies");
        for (i, resolver_error) in resolution.errors.iter().enumerate() {
            err = err.with_context(format!("error_{i}"), resolver_error.to_string());
        }
        return Err(err);
    }

    let previous = LockFile::load_json(&paths.lockfile).ok();

    let selected: Vec<&str> = if options.cookbooks.is_empty() {
        resolution.cookbooks.keys().map(String::as_str).collect()
    } else {
        options.cookbooks.iter().map(String::as_str).collect()
    };

    for name in &selected {
        let Some(cookbook) = resolution.cookbooks.get(*name) else {
            continue;
        };
        let previous_version = previous.as_ref().and_then(|lock| {
            lock.sources
                .values()
                .find_map(|source| source.cookbooks.get(*name).map(|c| c.version.clone()))
        });
        match previous_version {
            Some(old) if old != cookbook.version.to_string() => {
                println!("{name}: {old} -> {}", cookbook.version);
            }
            Some(_) => {}
            None => println!("{name}: installed at {}", cookbook.version),
        }
    }

    let generated_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let lockfile = LockFile::from_resolution(&resolution, generated_at);
    lockfile
        .save_json(&paths.lockfile)
        .map_err(|e| LarderError::filesystem("failed to write lock file", e))?;

    Ok(())
}
