use crate::error::Error;
use crate::storage::{Database, Entry};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Fingerprint → every file sharing it, across all catalogs. Only groups of two or more.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DuplicateGroups {
    groups: BTreeMap<String, Vec<Entry>>,
}

impl DuplicateGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, fingerprint: &str) -> Option<&[Entry]> {
        self.groups.get(fingerprint).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entry])> {
        self.groups
            .iter()
            .map(|(fp, entries)| (fp.as_str(), entries.as_slice()))
    }

    /// Bytes that would be freed by keeping a single copy of each group.
    pub fn wasted_bytes(&self) -> u64 {
        self.groups
            .values()
            .map(|entries| {
                let size = entries.first().map_or(0, |e| e.size);
                size * (entries.len() as u64 - 1)
            })
            .sum()
    }
}

/// Group every fingerprinted file in the store by content.
///
/// Best effort: a catalog whose entries cannot be listed is skipped with a
/// warning. Failing to list the catalogs themselves is an error.
pub fn find_duplicates(db: &Database) -> Result<DuplicateGroups, Error> {
    let catalogs = db.list_catalogs()?;

    let mut by_fingerprint: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
    for catalog in &catalogs {
        let entries = match db.list_entries(&catalog.id) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping catalog {} ({}): {}", catalog.name, catalog.id, e);
                continue;
            }
        };

        for entry in entries {
            if entry.is_dir || !entry.has_fingerprint() {
                continue;
            }
            if let Some(fp) = entry.fingerprint.clone() {
                by_fingerprint.entry(fp).or_default().push(entry);
            }
        }
    }

    by_fingerprint.retain(|_, entries| entries.len() > 1);
    for entries in by_fingerprint.values_mut() {
        entries.sort_by(|a, b| (&a.catalog_id, &a.path).cmp(&(&b.catalog_id, &b.path)));
    }

    let groups = DuplicateGroups {
        groups: by_fingerprint,
    };
    info!(
        "Found {} duplicate groups across {} catalogs ({} bytes reclaimable)",
        groups.len(),
        catalogs.len(),
        groups.wasted_bytes()
    );
    Ok(groups)
}
