//! Cache command - inspect or clear the result cache.

use std::path::Path;

use clap::{Args, Subcommand};
use console::style;

use docket_core::ResultCache;

use super::load_config;

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show entry count, hits and TTL
    Stats,

    /// Remove every cached result
    Clear,
}

pub fn run(args: CacheArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let cache = ResultCache::new(&config.cache);

    match args.command {
        CacheCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
        CacheCommand::Clear => {
            let removed = cache.len();
            cache.clear()?;
            println!("{} Cleared {} cached results", style("✓").green(), removed);
        }
    }

    Ok(())
}
