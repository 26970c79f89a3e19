//! Batch command - process every supported document in a folder.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::warn;

use docket_core::{ExtractionResult, Status, StatusCounts};

use super::{build_pipeline, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Folder to scan
    #[arg(required = true)]
    folder: PathBuf,

    /// Leave files in place instead of archiving them
    #[arg(long)]
    no_archive: bool,

    /// Include subfolders
    #[arg(short, long)]
    recursive: bool,

    /// Bypass the result cache
    #[arg(long)]
    no_cache: bool,

    /// Write a JSON summary into the output folder
    #[arg(long)]
    summary: bool,
}

#[derive(Serialize)]
struct BatchSummary<'a> {
    folder: &'a Path,
    elapsed_ms: u128,
    counts: StatusCounts,
    results: &'a [ExtractionResult],
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let output_dir = config.paths.output_dir.clone();
    let pipeline = build_pipeline(config)?;

    let mut options = pipeline.batch_options();
    options.archive &= !args.no_archive;
    options.recursive |= args.recursive;
    options.use_cache &= !args.no_cache;

    let mut handle = pipeline.batch.start(&args.folder, options)?;
    let total = pipeline.batch.status().total;

    if total == 0 {
        println!(
            "{} No supported files in {}",
            style("ℹ").blue(),
            args.folder.display()
        );
    } else {
        println!("{} Found {} files to process", style("ℹ").blue(), total);
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut stopping = false;

    loop {
        tokio::select! {
            joined = &mut handle => {
                joined?;
                break;
            }
            _ = &mut ctrl_c, if !stopping => {
                stopping = true;
                pipeline.batch.stop();
                pb.println(format!("{} Stopping after the current file", style("!").yellow()));
            }
            _ = ticker.tick() => {
                let status = pipeline.batch.status();
                pb.set_position(status.processed as u64);
                pb.set_message(status.current_file.unwrap_or_default());
            }
        }
    }

    let status = pipeline.batch.status();
    pb.set_position(status.processed as u64);
    pb.finish_and_clear();

    let results = pipeline.batch.results();
    print_summary(&status.counts, &results, start.elapsed());

    if args.summary {
        fs::create_dir_all(&output_dir)?;
        let path = output_dir.join("batch_summary.json");
        let summary = BatchSummary {
            folder: &args.folder,
            elapsed_ms: start.elapsed().as_millis(),
            counts: status.counts,
            results: &results,
        };
        fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        println!("{} Summary written to {}", style("✓").green(), path.display());
    }

    if stopping && status.processed < total {
        warn!("Batch stopped after {} of {} files", status.processed, total);
    }

    Ok(())
}

fn print_summary(counts: &StatusCounts, results: &[ExtractionResult], elapsed: Duration) {
    println!();
    println!(
        "{} Processed {} files in {:.2}s",
        style("✓").green(),
        counts.total(),
        elapsed.as_secs_f64()
    );
    println!(
        "  Success: {}, Review: {}, Error: {}",
        style(counts.success).green(),
        style(counts.review).yellow(),
        style(counts.error).red()
    );

    let failed: Vec<_> = results.iter().filter(|r| r.status == Status::Error).collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in failed {
            println!(
                "  {} {}: {}",
                style("✗").red(),
                result.filename,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
