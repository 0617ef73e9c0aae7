use crate::error::Error;
use crate::storage::{Database, Entry};
use chrono::Utc;
use std::path::Path;
use tracing::info;

/// Record the source catalog's entries under the target catalog after an external copy.
///
/// Each entry keeps its relative path, size, mtime and fingerprint; its
/// absolute path is re-rooted at `target_root`. Returns how many entries were
/// written. Target aggregates are recomputed at the end.
pub fn mirror_entries(
    db: &Database,
    source_id: &str,
    target_id: &str,
    target_root: &Path,
) -> Result<usize, Error> {
    db.get_catalog(source_id)?;
    db.get_catalog(target_id)?;

    let now = Utc::now();
    let mut written = 0;
    for source in db.list_entries(source_id)? {
        let path = target_root
            .join(&source.relative_path)
            .to_string_lossy()
            .into_owned();
        let mirrored = Entry {
            path,
            catalog_id: target_id.to_string(),
            last_seen: now,
            ..source
        };
        db.upsert_entry(&mirrored).map_err(|source| Error::Record {
            path: mirrored.path.clone(),
            source,
        })?;
        written += 1;
    }

    db.recompute_aggregates(target_id)?;
    info!("Recorded {} mirrored entries in catalog {}", written, target_id);
    Ok(written)
}
