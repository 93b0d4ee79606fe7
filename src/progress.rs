//! Progress reporting for loading and traversal
//!
//! Provides real-time status display using indicatif spinners.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner-based status reporter for the long-running phases.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Print the run header before loading starts.
pub fn print_header(image: &str, workers: usize) {
    println!();
    println!("{}", style("fsimage-walker").bold().cyan());
    println!("  Image:   {image}");
    println!("  Workers: {workers}");
    println!();
}

/// Print the traversal summary.
pub fn print_summary(
    dirs: u64,
    files: u64,
    symlinks: u64,
    bytes: u64,
    failed_subtrees: usize,
    duration: Duration,
) {
    let total = dirs + files + symlinks;
    let rate = if duration.as_secs_f64() > 0.0 {
        total as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    println!();
    println!("{}", style("Traversal complete").bold().green());
    println!("  Directories: {dirs}");
    println!("  Files:       {files}");
    println!("  Symlinks:    {symlinks}");
    println!("  Total size:  {}", format_size(bytes, BINARY));
    println!("  Elapsed:     {:.2}s ({rate:.0} nodes/s)", duration.as_secs_f64());
    if failed_subtrees > 0 {
        println!(
            "  {}",
            style(format!("Failed subtrees: {failed_subtrees}")).yellow()
        );
    }
    println!();
}
