//! Configuration types for fsimage-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::image::SortStrategy;
use crate::walker::{FailurePolicy, TraverseMode, TraverseOptions};
use clap::Parser;
use std::path::PathBuf;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Offline namespace image inspector
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fsimage-walker",
    version,
    about = "Offline namespace image inspector",
    long_about = "Loads a namespace image snapshot and answers queries against it without\n\
                  touching the live filesystem.\n\n\
                  The default command traverses the whole namespace and prints aggregate\n\
                  statistics (per-owner/per-group usage, size histogram).",
    after_help = "EXAMPLES:\n    \
        fsimage-walker fsimage.img\n    \
        fsimage-walker fsimage.img summary --path /data -w 16\n    \
        fsimage-walker fsimage.img ls /data/logs\n    \
        fsimage-walker fsimage.img stat /data/logs/app.log\n    \
        fsimage-walker fsimage.img summary --sequential --sequential-sort"
)]
pub struct CliArgs {
    /// Namespace image file to load
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Subcommand (defaults to summary of the whole namespace)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Number of worker threads for parallel traversal
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Sort the inode table on a single thread instead of in parallel
    #[arg(long)]
    pub sequential_sort: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug-level logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Traverse the namespace and print aggregate statistics
    Summary {
        /// Start path for the traversal
        #[arg(long, default_value = "/", value_name = "PATH")]
        path: String,

        /// Traverse sequentially instead of fanning out per subdirectory
        #[arg(long)]
        sequential: bool,

        /// Abort on the first failing subtree instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// List the children of a directory
    Ls {
        /// Directory path
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Show one entry in detail
    Stat {
        /// Entry path
        #[arg(value_name = "PATH")]
        path: String,
    },
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub image: PathBuf,
    pub command: Command,
    pub workers: usize,
    pub sort: SortStrategy,
    pub show_progress: bool,
    pub verbose: bool,
}

impl AppConfig {
    /// Validate CLI arguments and produce a runtime configuration.
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }
        if !args.image.is_file() {
            return Err(ConfigError::InvalidImagePath {
                path: args.image.display().to_string(),
                reason: "not a readable file".to_string(),
            });
        }

        Ok(Self {
            image: args.image,
            command: args.command.unwrap_or(Command::Summary {
                path: "/".to_string(),
                sequential: false,
                strict: false,
            }),
            workers: args.workers,
            sort: if args.sequential_sort {
                SortStrategy::Sequential
            } else {
                SortStrategy::Parallel
            },
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Traversal options for a summary run.
    pub fn traverse_options(&self, sequential: bool, strict: bool) -> TraverseOptions {
        TraverseOptions {
            mode: if sequential {
                TraverseMode::Sequential
            } else {
                TraverseMode::Parallel
            },
            failure_policy: strict.then_some(FailurePolicy::Propagate),
            workers: Some(self.workers),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(MAX_WORKERS)
}
