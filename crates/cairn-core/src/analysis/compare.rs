use crate::error::Error;
use crate::storage::{Database, Entry};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// How a source catalog differs from a target catalog, file by file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonResult {
    pub source_id: String,
    pub target_id: String,
    /// Source files with no target file at the same relative path.
    pub new: Vec<Entry>,
    /// Source files whose target counterpart differs in size, mtime or fingerprint.
    pub updated: Vec<Entry>,
    /// Target files with no source file at the same relative path.
    pub deleted: Vec<Entry>,
    /// For new files: target files that already hold the same content elsewhere.
    pub duplicates: BTreeMap<String, Vec<Entry>>,
}

impl ComparisonResult {
    pub fn is_identical(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Bytes a copy from source to target would have to move.
    pub fn transfer_bytes(&self) -> u64 {
        self.new.iter().chain(&self.updated).map(|e| e.size).sum()
    }
}

/// Classify every file of `source_id` against `target_id`. Directories are never
/// classified, but any source entry at a path keeps the target file there from
/// counting as deleted.
pub fn compare(db: &Database, source_id: &str, target_id: &str) -> Result<ComparisonResult, Error> {
    db.get_catalog(source_id)?;
    db.get_catalog(target_id)?;

    let source_entries = db.list_entries(source_id)?;
    let source_files: Vec<&Entry> = source_entries.iter().filter(|e| !e.is_dir).collect();
    let target_files: Vec<Entry> = db
        .list_entries(target_id)?
        .into_iter()
        .filter(|e| !e.is_dir)
        .collect();
    debug!(
        "Comparing {} source files against {} target files",
        source_files.len(),
        target_files.len()
    );

    let mut by_relative: AHashMap<&str, &Entry> = AHashMap::with_capacity(target_files.len());
    let mut by_fingerprint: AHashMap<&str, Vec<&Entry>> = AHashMap::new();
    for file in &target_files {
        by_relative.insert(file.relative_path.as_str(), file);
        if let Some(fp) = file.fingerprint.as_deref().filter(|fp| !fp.is_empty()) {
            by_fingerprint.entry(fp).or_default().push(file);
        }
    }

    let mut result = ComparisonResult {
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        ..Default::default()
    };

    for &file in &source_files {
        match by_relative.get(file.relative_path.as_str()) {
            None => {
                if let Some(matches) = file
                    .fingerprint
                    .as_deref()
                    .filter(|fp| !fp.is_empty())
                    .and_then(|fp| by_fingerprint.get(fp))
                {
                    result.duplicates.insert(
                        file.relative_path.clone(),
                        matches.iter().map(|e| (*e).clone()).collect(),
                    );
                }
                result.new.push(file.clone());
            }
            Some(target) => {
                if differs(file, target) {
                    result.updated.push(file.clone());
                }
            }
        }
    }

    let source_paths: AHashSet<&str> = source_entries
        .iter()
        .map(|e| e.relative_path.as_str())
        .collect();
    result.deleted = target_files
        .iter()
        .filter(|e| !source_paths.contains(e.relative_path.as_str()))
        .cloned()
        .collect();

    for list in [&mut result.new, &mut result.updated, &mut result.deleted] {
        list.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    }

    info!(
        "Compared {} → {}: {} new, {} updated, {} deleted, {} with duplicates in target",
        source_id,
        target_id,
        result.new.len(),
        result.updated.len(),
        result.deleted.len(),
        result.duplicates.len()
    );
    Ok(result)
}

/// Size and whole-second mtime always count; fingerprints only when both sides have one.
fn differs(source: &Entry, target: &Entry) -> bool {
    if source.size != target.size || !source.same_mtime(&target.modified) {
        return true;
    }
    match (source.fingerprint.as_deref(), target.fingerprint.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => a != b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn file(rel: &str, size: u64, secs: i64, fp: Option<&str>) -> Entry {
        Entry {
            path: format!("/r/{}", rel),
            relative_path: rel.to_string(),
            size,
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
            fingerprint: fp.map(str::to_string),
            catalog_id: "c".into(),
            last_seen: Utc::now(),
            is_dir: false,
        }
    }

    #[test]
    fn test_differs_on_size_and_mtime() {
        let base = file("a", 10, 100, None);
        assert!(!differs(&base, &file("a", 10, 100, None)));
        assert!(differs(&base, &file("a", 11, 100, None)));
        assert!(differs(&base, &file("a", 10, 101, None)));
    }

    #[test]
    fn test_fingerprint_counts_only_when_both_present() {
        let with_a = file("a", 10, 100, Some("aaa"));
        assert!(differs(&with_a, &file("a", 10, 100, Some("bbb"))));
        assert!(!differs(&with_a, &file("a", 10, 100, None)));
        assert!(!differs(&file("a", 10, 100, None), &with_a));
        assert!(!differs(&with_a, &file("a", 10, 100, Some(""))));
    }
}
