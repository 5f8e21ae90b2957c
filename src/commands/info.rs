//! Info command
//!
//! Print a cookbook's resolved metadata: version, dependencies, source.

use crate::commands::{build_adapters, load_manifest};
use crate::config::Config;
use crate::error::LarderError;
use crate::version::Version;
use serde::Serialize;

#[derive(Debug)]
pub struct InfoOptions {
    pub cookbook: String,
    pub version: Option<String>,
    pub format: String,
}

#[derive(Debug, Serialize)]
struct CookbookInfo {
    name: String,
    version: String,
    source: String,
    dependencies: std::collections::BTreeMap<String, String>,
}

pub async fn run(options: InfoOptions, config: &Config) -> Result<(), LarderError> {
    let working_dir = std::env::current_dir().unwrap_or_default();
    let (_paths, manifest) = load_manifest(&working_dir)?;
    let adapters = build_adapters(&manifest, config);

    let mut sorted: Vec<&Box<dyn crate::adapters::SourceAdapter>> = adapters.iter().collect();
    sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));

    let requested_version = options
        .version
        .as_deref()
        .map(Version::parse)
        .transpose()
        .map_err(|e| LarderError::validation(format!("invalid version: {e}")))?;

    let mut found = None;
    for adapter in sorted {
        let Ok(versions) = adapter.list_versions(&options.cookbook).await else {
            continue;
        };
        let candidate = match &requested_version {
            Some(v) => versions.into_iter().find(|existing| existing == v),
            None => versions.into_iter().max_by(Version::compare),
        };
        let Some(version) = candidate else { continue };
        if let Ok(descriptor) = adapter.fetch_descriptor(&options.cookbook, &version).await {
            found = Some(descriptor);
            break;
        }
    }

    let Some(descriptor) = found else {
        return Err(LarderError::validation(format!(
            "cookbook '{}' not found in any configured source",
            options.cookbook
        )));
    };

    let info = CookbookInfo {
        name: descriptor.name.clone(),
        version: descriptor.version.to_string(),
        source: descriptor.source.label(),
        dependencies: descriptor
            .dependencies
            .iter()
            .map(|(name, constraint)| (name.clone(), constraint.to_string()))
            .collect(),
    };

    if options.format == "json" {
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| LarderError::validation(format!("failed to render JSON: {e}")))?;
        println!("{json}");
    } else {
        println!("{} ({})", info.name, info.version);
        println!("source: {}", info.source);
        if info.dependencies.is_empty() {
            println!("dependencies: none");
        } else {
            println!("dependencies:");
            for (name, constraint) in &info.dependencies {
                println!("  {name} {constraint}");
            }
        }
    }

    Ok(())
}
