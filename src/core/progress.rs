//! Progress reporting and cooperative cancellation
//!
//! Long-running operations (discovery and batch execution) report through a plain
//! callback and check a [`CancellationToken`] between units of work. Neither knows
//! anything about the caller's UI.

use crate::core::selection::ElementType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shown before any unit has completed
pub const ETA_UNKNOWN: &str = "--:--:--";

/// Progress of one unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Units finished, including this one
    pub done: usize,
    /// Units in the whole run
    pub total: usize,
    /// Source file of the unit
    pub file: String,
    pub element_type: ElementType,
    /// Element id; empty for discovery updates
    pub id: String,
    /// Parameter; empty for discovery updates
    pub param: String,
}

/// Progress callback shared with a worker thread
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Shared flag a caller sets to stop a run after the in-flight unit
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing flag, e.g. one also set by a Ctrl+C handler
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag before reusing the token for another run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Linear ETA: `elapsed * (total - done) / done`. `None` before the first unit.
pub fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    let remaining = total.saturating_sub(done) as f64;
    Some(Duration::from_secs_f64(
        elapsed.as_secs_f64() * remaining / done as f64,
    ))
}

/// `HH:MM:SS`, hours not capped at 24
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// ETA text for a progress display
pub fn format_eta(elapsed: Duration, done: usize, total: usize) -> String {
    match estimate_remaining(elapsed, done, total) {
        Some(remaining) => format_hms(remaining),
        None => ETA_UNKNOWN.to_string(),
    }
}
