//! Progress bar utilities for CLI output
//!
//! Key features:
//! - Progress bars that suspend cleanly when printing run messages
//! - Consistent visual styling across discovery and runs
//! - ETA computed by linear extrapolation over finished units

use crate::core::progress::{format_eta, ProgressUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Spinner style for discovery
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

/// Bar style for runs
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Style for a finished bar
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Discovery spinner
// ============================================================================

/// Spinner shown while identifiers are discovered
pub struct DiscoveryProgress {
    spinner: ProgressBar,
    start_time: Instant,
}

impl DiscoveryProgress {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Discovering identifiers...");

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    /// Show which (file, type) pair just finished
    pub fn update(&self, update: &ProgressUpdate) {
        self.spinner.set_message(format!(
            "Scanning {} in {} ({}/{})",
            update.element_type, update.file, update.done, update.total
        ));
    }

    pub fn finish(&self, ids: usize, cancelled: bool) {
        let elapsed = self.start_time.elapsed();
        let verb = if cancelled { "Stopped after finding" } else { "Found" };
        self.spinner.finish_with_message(format!(
            "✓ {} {} identifier(s) in {:.1}s",
            verb,
            ids,
            elapsed.as_secs_f64()
        ));
    }

    pub fn finish_with_error(&self, msg: &str) {
        self.spinner.abandon_with_message(format!("✗ {}", msg));
    }
}

impl Default for DiscoveryProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Run progress
// ============================================================================

/// Progress bar over the series of a run
pub struct RunProgress {
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl RunProgress {
    pub fn new(total_units: u64) -> Self {
        let progress_bar = ProgressBar::new(total_units);
        progress_bar.set_style(progress_bar_style());
        progress_bar.enable_steady_tick(Duration::from_millis(100));
        progress_bar.set_message(format!("ETA {}", format_eta(Duration::ZERO, 0, 0)));

        Self {
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// Apply a unit update from the executor
    pub fn update(&self, update: &ProgressUpdate) {
        if self.progress_bar.length() != Some(update.total as u64) {
            self.progress_bar.set_length(update.total as u64);
        }
        self.progress_bar.set_position(update.done as u64);
        self.progress_bar.set_message(format!(
            "{} {} {}  ETA {}",
            update.element_type,
            update.id,
            update.param,
            format_eta(self.start_time.elapsed(), update.done, update.total)
        ));
    }

    /// Print a line without tearing the bar
    pub fn log(&self, msg: &str) {
        self.progress_bar.suspend(|| {
            println!("  {}", msg);
        });
    }

    pub fn finish(&self) {
        self.progress_bar.set_style(completed_style());
        self.progress_bar.finish_with_message(format!(
            "Complete in {}",
            format_duration(self.start_time.elapsed())
        ));
    }

    pub fn finish_with_error(&self, msg: &str) {
        self.progress_bar.abandon_with_message(format!("✗ {}", msg));
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::ElementType;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_run_progress_follows_updates() {
        let progress = RunProgress::new(0);
        progress.update(&ProgressUpdate {
            done: 2,
            total: 5,
            file: "model.out".to_string(),
            element_type: ElementType::Node,
            id: "J1".to_string(),
            param: "Depth_above_invert".to_string(),
        });
        assert_eq!(progress.progress_bar.length(), Some(5));
        assert_eq!(progress.progress_bar.position(), 2);
        progress.finish();
    }
}
