//! Watch command - process documents as they land in a folder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use console::style;

use docket_core::{ExtractionResult, Status};

use super::{build_pipeline, load_config};

/// Arguments for the watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Folder to watch (default: the configured input folder)
    folder: Option<PathBuf>,

    /// Bypass the result cache
    #[arg(long)]
    no_cache: bool,
}

pub async fn run(args: WatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    config.cache.enabled &= !args.no_cache;
    let folder = args.folder.unwrap_or_else(|| config.paths.input_dir.clone());
    config.paths.ensure_dirs()?;

    let mut pipeline = build_pipeline(config)?;
    pipeline.watcher.start(&folder)?;

    println!(
        "{} Watching {} (Ctrl-C to stop)",
        style("ℹ").blue(),
        folder.display()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut mark = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                let (fresh, next) = pipeline.store.since(mark);
                for result in &fresh {
                    print_result(result);
                }
                mark = next;
            }
        }
    }

    let status = pipeline.watcher.status();
    pipeline.shutdown();
    println!(
        "{} Stopped watching, {} files processed",
        style("✓").green(),
        status.processed
    );

    Ok(())
}

fn print_result(result: &ExtractionResult) {
    let marker = match result.status {
        Status::Success => style("✓").green(),
        Status::Review => style("?").yellow(),
        _ => style("✗").red(),
    };
    println!(
        "  {} {} [{}%] {} / {}",
        marker,
        result.filename,
        result.confidence,
        result.vendor().unwrap_or("-"),
        result.invoice_number().unwrap_or("-")
    );
}
