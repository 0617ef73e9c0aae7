use super::walk::{TreeWalker, WalkOptions};
use crate::error::Error;
use crate::hasher::fingerprint_or_none;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::storage::{Database, Entry};
use ahash::AHashMap;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    /// Observed entries whose size and mtime matched; nothing was written for them.
    pub unchanged: u64,
}

impl ReconcileStats {
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Applies the add/update/remove delta between a catalog and a fresh walk of its root.
pub struct Reconciler<'a> {
    db: &'a Database,
    options: WalkOptions,
    reporter: &'a dyn ProgressReporter,
    count_timeout: Option<Duration>,
}

impl<'a> Reconciler<'a> {
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

    pub fn with_count_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.count_timeout = timeout;
        self
    }

    /// Bring `catalog_id` in line with what currently exists under `root`.
    ///
    /// A known path is rewritten only when its size or whole-second mtime
    /// changed. Paths not seen during the walk are deleted. Running this twice
    /// with no filesystem change in between reports nothing on the second run.
    pub fn reconcile(
        &self,
        catalog_id: &str,
        root: &Path,
        compute_fingerprints: bool,
    ) -> Result<ReconcileStats, Error> {
        self.db.get_catalog(catalog_id)?;
        info!("Reconciling catalog {} against {}", catalog_id, root.display());
        let start = Instant::now();

        let mut known: AHashMap<String, Entry> = self
            .db
            .list_entries(catalog_id)?
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        debug!("{} entries currently cataloged", known.len());

        let walker = TreeWalker::new(root, &self.options);
        let entries =
            super::start_walk(&walker, self.reporter, "Reindexing", self.count_timeout)?;

        let mut stats = ReconcileStats::default();
        let mut files_seen = 0u64;
        let mut bytes_seen = 0u64;

        for walked in entries {
            let prior = known.remove(walked.path_string().as_str());
            let modified = walked.modified_utc();

            let changed = match &prior {
                None => true,
                Some(prior) => prior.size != walked.size || !prior.same_mtime(&modified),
            };

            if changed {
                let fingerprint = if !walked.is_file {
                    None
                } else if needs_fingerprint(compute_fingerprints, prior.as_ref()) {
                    fingerprint_or_none(&walked.path)
                } else {
                    prior.as_ref().and_then(|p| p.fingerprint.clone())
                };

                let entry = walked.into_entry(root, catalog_id, fingerprint);
                self.db
                    .upsert_entry(&entry)
                    .map_err(|source| Error::Record {
                        path: entry.path.clone(),
                        source,
                    })?;

                if prior.is_some() {
                    debug!("Updated {}", entry.relative_path);
                    stats.updated += 1;
                } else {
                    debug!("Added {}", entry.relative_path);
                    stats.added += 1;
                }

                if !entry.is_dir {
                    files_seen += 1;
                    bytes_seen += entry.size;
                    self.reporter
                        .on_entry(&entry.relative_path, files_seen, bytes_seen);
                }
            } else {
                stats.unchanged += 1;
                if !walked.is_dir {
                    files_seen += 1;
                    bytes_seen += walked.size;
                    self.reporter
                        .on_entry(&walked.relative_to(root), files_seen, bytes_seen);
                }
            }
        }

        let mut vanished: Vec<String> = known.into_keys().collect();
        vanished.sort();
        for path in vanished {
            let deleted = self
                .db
                .delete_entry(&path, catalog_id)
                .map_err(|source| Error::Record {
                    path: path.clone(),
                    source,
                })?;
            if deleted {
                debug!("Removed {}", path);
                stats.removed += 1;
            }
        }

        self.db.recompute_aggregates(catalog_id)?;

        let elapsed = start.elapsed().as_secs_f64();
        self.reporter.on_walk_complete(files_seen, elapsed);
        info!(
            "Reindexed {}: {} added, {} updated, {} removed, {} unchanged",
            root.display(),
            stats.added,
            stats.updated,
            stats.removed,
            stats.unchanged
        );
        Ok(stats)
    }
}

/// Whether a changed file gets a fresh fingerprint rather than carrying its old one forward.
fn needs_fingerprint(requested: bool, prior: Option<&Entry>) -> bool {
    requested || !prior.is_some_and(Entry::has_fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry_with(fingerprint: Option<&str>) -> Entry {
        Entry {
            path: "/r/a".into(),
            relative_path: "a".into(),
            size: 1,
            modified: Utc::now(),
            fingerprint: fingerprint.map(str::to_string),
            catalog_id: "c".into(),
            last_seen: Utc::now(),
            is_dir: false,
        }
    }

    #[test]
    fn test_needs_fingerprint_policy() {
        let with = entry_with(Some("abc"));
        let without = entry_with(None);

        assert!(needs_fingerprint(true, Some(&with)));
        assert!(!needs_fingerprint(false, Some(&with)));
        assert!(needs_fingerprint(false, Some(&without)));
        assert!(needs_fingerprint(false, None));
    }
}
