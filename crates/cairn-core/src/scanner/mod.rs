pub mod estimate;
pub mod reconcile;
pub mod scan;
pub mod walk;

pub use estimate::estimate_file_count;
pub use reconcile::{ReconcileStats, Reconciler};
pub use scan::{ScanStats, Scanner};
pub use walk::{TreeWalker, WalkOptions, WalkedEntry};

use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::Entry;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

impl WalkedEntry {
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Path relative to `root`; falls back to the full path if it is not under `root`.
    pub fn relative_to(&self, root: &Path) -> String {
        match self.path.strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => self.path_string(),
        }
    }

    /// Modification time truncated to whole seconds.
    pub fn modified_utc(&self) -> DateTime<Utc> {
        let secs = DateTime::<Utc>::from(self.modified).timestamp();
        crate::storage::models::from_unix_secs(secs)
    }

    pub fn into_entry(
        self,
        root: &Path,
        catalog_id: &str,
        fingerprint: Option<String>,
    ) -> Entry {
        Entry {
            relative_path: self.relative_to(root),
            modified: self.modified_utc(),
            path: self.path_string(),
            size: self.size,
            fingerprint: if self.is_file { fingerprint } else { None },
            catalog_id: catalog_id.to_string(),
            last_seen: Utc::now(),
            is_dir: self.is_dir,
        }
    }
}

/// Begin a walk, optionally racing a counting pass to size the progress display.
pub(crate) fn start_walk<'w>(
    walker: &'w TreeWalker,
    reporter: &dyn ProgressReporter,
    label: &str,
    count_timeout: Option<Duration>,
) -> Result<impl Iterator<Item = WalkedEntry> + 'w, Error> {
    let entries = walker.walk()?;
    let total = count_timeout.and_then(|timeout| estimate_file_count(walker, timeout));
    reporter.on_walk_start(label, total);
    Ok(entries)
}
