/// Trait for reporting walk progress.
///
/// The CLI implements it with indicatif bars; library callers and tests use
/// [`SilentReporter`]. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// `total_files` is `None` when the counting pass did not finish in time.
    fn on_walk_start(&self, _label: &str, _total_files: Option<u64>) {}
    fn on_entry(&self, _relative_path: &str, _files_seen: u64, _bytes_seen: u64) {}
    fn on_walk_complete(&self, _files: u64, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
