//! Larder command-line interface
//!
//! A Chef/Berkshelf-compatible cookbook dependency manager.

use clap::{Parser, Subcommand};
use larder::config::Config;
use larder::error::{LarderError, render_error};
use std::process;

mod commands {
    pub use larder::commands::*;
}

#[derive(Parser)]
#[command(name = "larder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A Chef cookbook dependency manager", long_about = None)]
pub(crate) struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Path to a config file (merged on top of the usual precedence chain)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, download, cache, and lock a manifest's cookbooks
    Install {
        /// Only install cookbooks in these groups
        #[arg(long)]
        only: Vec<String>,

        /// Exclude cookbooks in these groups
        #[arg(long)]
        except: Vec<String>,

        /// Directory containing the Berksfile/Policyfile
        #[arg(long)]
        path: Option<String>,
    },

    /// Re-resolve all or the listed cookbooks, ignoring lock versions
    Update {
        /// Specific cookbooks to update (updates all if not specified)
        cookbooks: Vec<String>,

        /// Only update cookbooks in these groups
        #[arg(long)]
        only: Vec<String>,

        /// Exclude cookbooks in these groups
        #[arg(long)]
        except: Vec<String>,
    },

    /// Print metadata for a resolved cookbook
    Info {
        /// Name of the cookbook
        cookbook: String,

        /// Specific version (uses the highest available if not specified)
        version: Option<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Search configured sources for a cookbook name
    Search {
        /// Search query
        query: String,
    },

    /// Inspect and manage the cookbook download cache
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    larder::debug::init_debug(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("{}", render_error(&err));
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), LarderError> {
    let working_dir = std::env::current_dir().unwrap_or_default();
    let config = Config::load(&working_dir, cli.config.as_deref().map(std::path::Path::new))
        .map_err(|e| LarderError::configuration(e.to_string()))?;

    match cli.command {
        Commands::Install { only, except, path } => {
            commands::install::run(
                commands::install::InstallOptions { only, except, path },
                &config,
            )
            .await
        }
        Commands::Update {
            cookbooks,
            only,
            except,
        } => {
            commands::update::run(
                commands::update::UpdateOptions {
                    cookbooks,
                    only,
                    except,
                },
                &config,
            )
            .await
        }
        Commands::Info {
            cookbook,
            version,
            format,
        } => {
            commands::info::run(
                commands::info::InfoOptions {
                    cookbook,
                    version,
                    format,
                },
                &config,
            )
            .await
        }
        Commands::Search { query } => {
            commands::search::run(commands::search::SearchOptions { query }, &config).await
        }
        Commands::Cache { command } => commands::cache::run(command, &config).await,
    }
}
