//! Progress observer for fetch runs.
//!
//! Reporting is advisory output only; nothing here feeds back into the
//! fetched data.

use std::time::Duration;

/// Counts reported when a fetch finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Files that passed the pattern filter.
    pub matched: usize,
    /// Files whose blob was fetched and recorded.
    pub fetched: usize,
    /// Files whose blob fetch failed.
    pub failed: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting fetch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the tree has been filtered.
    fn files_matched(&self, total: usize);
    /// Called after each successful blob retrieval, in completion order.
    fn file_fetched(&self, path: &str, completed: usize, total: usize);
    /// Called when a single blob could not be fetched.
    fn file_failed(&self, path: &str, error: &str);
    /// Called when the fetch completes.
    fn done(&self, summary: &FetchSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn files_matched(&self, _total: usize) {}
    fn file_fetched(&self, _path: &str, _completed: usize, _total: usize) {}
    fn file_failed(&self, _path: &str, _error: &str) {}
    fn done(&self, _summary: &FetchSummary) {}
}
