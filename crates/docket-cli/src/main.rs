//! CLI for scanned invoice ingestion.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, cache, config, process, watch};

/// Docket - extract vendor, invoice and VAT data from scanned documents
#[derive(Parser)]
#[command(name = "docket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single document
    Process(process::ProcessArgs),

    /// Process every supported document in a folder
    Batch(batch::BatchArgs),

    /// Watch a folder and process new documents as they appear
    Watch(watch::WatchArgs),

    /// Inspect or clear the result cache
    Cache(cache::CacheArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config).await,
        Commands::Batch(args) => batch::run(args, config).await,
        Commands::Watch(args) => watch::run(args, config).await,
        Commands::Cache(args) => cache::run(args, config),
        Commands::Config(args) => config::run(args, config),
    }
}
