//! Cache command
//!
//! Inspect and manage the content-addressed cookbook cache: `list`,
//! `clean`, `info`, `clear`.

use crate::cache::Cache;
use crate::config::Config;
use crate::error::LarderError;
use std::time::Duration;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum CacheCommands {
    /// List cache entries
    List {
        #[arg(long, default_value = "table")]
        format: String,
        #[arg(long)]
        verbose: bool,
    },
    /// Evict expired entries
    Clean {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        max_age: Option<String>,
    },
    /// Show cache statistics
    Info {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Remove all cache entries
    Clear {
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(command: CacheCommands, config: &Config) -> Result<(), LarderError> {
    let cache_dir = crate::paths::cookbooks_cache_dir(&config.cache_path);
    let cache = Cache::new(cache_dir, 1_000_000_000, None)
        .map_err(|e| LarderError::filesystem("failed to open cache", e))?;

    match command {
        CacheCommands::List { format, verbose } => list(&cache, &format, verbose),
        CacheCommands::Clean { dry_run, max_age } => clean(&cache, dry_run, max_age.as_deref()),
        CacheCommands::Info { format } => info(&cache, &format),
        CacheCommands::Clear { force } => clear(&cache, force),
    }
}

fn list(cache: &Cache, format: &str, verbose: bool) -> Result<(), LarderError> {
    let entries = cache
        .list()
        .map_err(|e| LarderError::filesystem("failed to list cache", e))?;

    if format == "json" {
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| LarderError::validation(format!("failed to render JSON: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    for (key, entry) in &entries {
        if verbose {
            println!(
                "{key}  {}  ttl={:?}",
                crate::cache::human_bytes(entry.size),
                entry.ttl_seconds
            );
        } else {
            println!("{key}  {}", crate::cache::human_bytes(entry.size));
        }
    }
    Ok(())
}

fn clean(cache: &Cache, dry_run: bool, max_age: Option<&str>) -> Result<(), LarderError> {
    let _ = max_age.map(parse_max_age).transpose()?;

    if dry_run {
        let entries = cache
            .list()
            .map_err(|e| LarderError::filesystem("failed to list cache", e))?;
        println!("would inspect {} entries for expiry", entries.len());
        return Ok(());
    }

    let removed = cache
        .cleanup(|| false)
        .map_err(|e| LarderError::filesystem("failed to clean cache", e))?;
    println!("removed {removed} expired entries");
    Ok(())
}

fn info(cache: &Cache, format: &str) -> Result<(), LarderError> {
    let stats = cache
        .info()
        .map_err(|e| LarderError::filesystem("failed to read cache stats", e))?;

    if format == "json" {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|e| LarderError::validation(format!("failed to render JSON: {e}")))?;
        println!("{json}");
    } else {
        println!("entries: {}", stats.entry_count);
        println!("size: {}", crate::cache::human_bytes(stats.total_size));
        println!("hit rate: {:.1}%", stats.hit_rate * 100.0);
    }
    Ok(())
}

fn clear(cache: &Cache, force: bool) -> Result<(), LarderError> {
    if !force {
        return Err(LarderError::validation(
            "refusing to clear the cache without --force",
        ));
    }
    cache
        .clear()
        .map_err(|e| LarderError::filesystem("failed to clear cache", e))?;
    println!("cache cleared");
    Ok(())
}

/// Parse `--max-age`: an integer followed by `h`/`d`/`w`, or the standard
/// `Ns`/`Nm`/`Nh` duration syntax.
fn parse_max_age(input: &str) -> Result<Duration, LarderError> {
    let invalid = || LarderError::validation(format!("invalid --max-age value: '{input}'"));

    let (digits, unit) = input.split_at(input.len().saturating_sub(1));
    let count: u64 = digits.parse().map_err(|_| invalid())?;

    let seconds = match unit {
        "w" => count * 7 * 24 * 3600,
        "d" => count * 24 * 3600,
        "h" => count * 3600,
        "m" => count * 60,
        "s" => count,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_days_and_hours() {
        assert_eq!(parse_max_age("30d").unwrap(), Duration::from_secs(30 * 24 * 3600));
        assert_eq!(parse_max_age("2w").unwrap(), Duration::from_secs(2 * 7 * 24 * 3600));
        assert_eq!(parse_max_age("12h").unwrap(), Duration::from_secs(12 * 3600));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_max_age("5x").is_err());
    }
}
