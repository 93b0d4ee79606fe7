//! fsimage-walker - Offline Namespace Image Inspector
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use fsimage_walker::config::{AppConfig, CliArgs, Command};
use fsimage_walker::progress::{print_header, print_summary, ProgressReporter};
use fsimage_walker::report::{print_detail, print_listing, SummaryVisitor};
use fsimage_walker::snapshot::{LoadOptions, Snapshot};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = AppConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config.image.display().to_string(), config.workers);
    }

    // Load the snapshot
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Loading namespace image...");
    }

    let load_start = Instant::now();
    let snapshot = Snapshot::load_with(&config.image, &LoadOptions { sort: config.sort })
        .context("Failed to load image")?;
    info!(
        inodes = snapshot.repository().len(),
        elapsed_ms = load_start.elapsed().as_millis() as u64,
        "image loaded"
    );

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    // Dispatch the command
    match config.command.clone() {
        Command::Summary {
            path,
            sequential,
            strict,
        } => run_summary(&config, &snapshot, &path, sequential, strict),
        Command::Ls { path } => print_listing(&snapshot, &path).map_err(Into::into),
        Command::Stat { path } => print_detail(&snapshot, &path).map_err(Into::into),
    }
}

/// Traverse and print aggregate statistics.
fn run_summary(
    config: &AppConfig,
    snapshot: &Snapshot,
    path: &str,
    sequential: bool,
    strict: bool,
) -> Result<()> {
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Traversing namespace...");
    }

    let start = Instant::now();
    let visitor = SummaryVisitor::new(snapshot);
    let options = config.traverse_options(sequential, strict);
    let stats = snapshot
        .traverse(&visitor, Some(path), &options)
        .context("Traversal failed")?;
    let elapsed = start.elapsed();

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    let report = visitor.into_report();
    if config.show_progress {
        print_summary(
            stats.dirs,
            stats.files,
            stats.symlinks,
            report.total_bytes,
            stats.failures.len(),
            elapsed,
        );
    }
    report.print();

    for failure in &stats.failures {
        info!(subtree = %failure.path, error = %failure.error, "subtree skipped");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "fsimage_walker=debug"
    } else {
        "fsimage_walker=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    Ok(())
}
