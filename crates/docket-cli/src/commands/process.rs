//! Process command - extract fields from a single document.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::info;

use docket_core::{archive_name, move_to_archive, ExtractionResult, Status};

use super::{build_pipeline, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Bypass the result cache
    #[arg(long)]
    no_cache: bool,

    /// Move the file into the archive folder under its generated name
    #[arg(long)]
    archive: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.is_file() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !config.ingest.is_supported(&args.input) {
        anyhow::bail!(
            "Unsupported file type: {} (expected one of: {})",
            args.input.display(),
            config.ingest.extensions.join(", ")
        );
    }

    let archive_dir = config.paths.archive_dir.clone();
    let use_cache = config.cache.enabled && !args.no_cache;
    let pipeline = build_pipeline(config)?;

    let engine = pipeline.engine.clone();
    let input = args.input.clone();
    let result = pipeline
        .pool
        .run(move || engine.parse(&input, use_cache))
        .await?;
    info!("Processed {} in {:?}", args.input.display(), start.elapsed());

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text(&result),
    }

    if args.archive {
        let target = archive_name(&result, &args.input);
        let moved = move_to_archive(&args.input, &archive_dir, &target)?;
        eprintln!("{} Archived to {}", style("✓").green(), moved.display());
    }

    Ok(())
}

fn print_text(result: &ExtractionResult) {
    let status = match result.status {
        Status::Success => style(result.status.as_str()).green(),
        Status::Review => style(result.status.as_str()).yellow(),
        _ => style(result.status.as_str()).red(),
    };

    println!("{}", style(&result.filename).bold());
    println!("  Status:          {} ({}%)", status, result.confidence);
    println!("  Vendor:          {}", result.vendor().unwrap_or("-"));
    println!("  Invoice number:  {}", result.invoice_number().unwrap_or("-"));
    println!("  Internal number: {}", result.internal_number().unwrap_or("-"));
    println!("  VAT id:          {}", result.vat_id().unwrap_or("-"));
    if let Some(error) = &result.error {
        println!("  Error:           {}", style(error).red());
    }
}
