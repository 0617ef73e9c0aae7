use super::walk::{TreeWalker, WalkOptions};
use crate::error::Error;
use crate::hasher::fingerprint_or_none;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::storage::Database;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files: u64,
    pub directories: u64,
    pub total_size: u64,
}

/// Builds or refreshes a catalog's entries from a full walk of its root.
pub struct Scanner<'a> {
    db: &'a Database,
    options: WalkOptions,
    reporter: &'a dyn ProgressReporter,
    count_timeout: Option<Duration>,
}

impl<'a> Scanner<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            options: WalkOptions::default(),
            reporter: &SilentReporter,
            count_timeout: None,
        }
    }

    pub fn with_walk_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Race a counting pass for at most `timeout` before walking. `None` skips counting.
    pub fn with_count_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.count_timeout = timeout;
        self
    }

    /// Walk `root` and upsert every visible object into `catalog_id`.
    ///
    /// Fingerprints are computed for files only, and only when requested; an
    /// unreadable file is recorded without one. A store failure on any entry
    /// aborts the scan, since the catalog's aggregates would no longer match.
    pub fn scan(
        &self,
        catalog_id: &str,
        root: &Path,
        compute_fingerprints: bool,
    ) -> Result<ScanStats, Error> {
        self.db.get_catalog(catalog_id)?;
        info!("Scanning {} into catalog {}", root.display(), catalog_id);
        let start = Instant::now();

        let walker = TreeWalker::new(root, &self.options);
        let entries = super::start_walk(&walker, self.reporter, "Indexing", self.count_timeout)?;

        let mut stats = ScanStats::default();
        for walked in entries {
            let fingerprint = if walked.is_file && compute_fingerprints {
                fingerprint_or_none(&walked.path)
            } else {
                None
            };
            let entry = walked.into_entry(root, catalog_id, fingerprint);

            self.db
                .upsert_entry(&entry)
                .map_err(|source| Error::Record {
                    path: entry.path.clone(),
                    source,
                })?;

            if entry.is_dir {
                stats.directories += 1;
            } else {
                stats.files += 1;
                stats.total_size += entry.size;
                self.reporter
                    .on_entry(&entry.relative_path, stats.files, stats.total_size);
            }
        }

        self.db.recompute_aggregates(catalog_id)?;

        let elapsed = start.elapsed().as_secs_f64();
        self.reporter.on_walk_complete(stats.files, elapsed);
        debug!("Scan of {} took {:.2}s", root.display(), elapsed);
        info!(
            "Indexed {} files, {} directories, {} bytes",
            stats.files, stats.directories, stats.total_size
        );
        Ok(stats)
    }
}
