//! Search command
//!
//! Query every configured source that exposes a matching cookbook name.

use crate::commands::{build_adapters, load_manifest};
use crate::config::Config;
use crate::error::LarderError;

#[derive(Debug)]
pub struct SearchOptions {
    pub query: String,
}

pub async fn run(options: SearchOptions, config: &Config) -> Result<(), LarderError> {
    let working_dir = std::env::current_dir().unwrap_or_default();
    let manifest = load_manifest(&working_dir).map(|(_, m)| m).unwrap_or_default();
    let adapters = build_adapters(&manifest, config);

    let mut any_match = false;
    for adapter in &adapters {
        if let Ok(versions) = adapter.list_versions(&options.query).await {
            any_match = true;
            let mut sorted = versions;
            sorted.sort_by(|a, b| b.compare(a));
            let rendered: Vec<String> = sorted.iter().map(ToString::to_string).collect();
            println!("{} ({}): {}", options.query, adapter.name(), rendered.join(", "));
        }
    }

    if !any_match {
        println!("no matches for '{}'", options.query);
    }

    Ok(())
}
