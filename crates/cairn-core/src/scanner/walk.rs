use crate::error::Error;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

/// One filesystem object observed under a root.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkedEntry {
    pub path: PathBuf,
    /// Byte length for files, 0 for directories.
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
    /// Regular file; pipes, sockets, devices and unfollowed links are not.
    pub is_file: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Glob patterns matched against full paths; matching directories are pruned.
    pub ignore_patterns: Vec<String>,
}

/// Lazy traversal of everything reachable under a root.
///
/// Names starting with `.` are excluded and hidden directories are pruned
/// with their whole subtree. Errors on individual entries are logged and
/// skipped; only an unusable root fails the walk.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    ignore: Vec<Pattern>,
}

impl TreeWalker {
    pub fn new(root: &Path, options: &WalkOptions) -> Self {
        let ignore = options
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            root: root.to_path_buf(),
            ignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh, independent walk. Each call re-reads the filesystem.
    pub fn walk(&self) -> Result<impl Iterator<Item = WalkedEntry> + '_, Error> {
        let metadata = fs::metadata(&self.root).map_err(|source| Error::Startup {
            path: self.root.clone(),
            source,
        })?;
        if metadata.is_dir() {
            fs::read_dir(&self.root).map_err(|source| Error::Startup {
                path: self.root.clone(),
                source,
            })?;
        }

        let ignore = &self.ignore;
        let entries = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || is_visible(entry, ignore))
            .filter_map(|result| match result {
                Ok(entry) => to_walked(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            });

        Ok(entries)
    }
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

fn is_visible(entry: &DirEntry, ignore: &[Pattern]) -> bool {
    if is_hidden_name(&entry.file_name().to_string_lossy()) {
        return false;
    }
    !ignore
        .iter()
        .any(|pattern| pattern.matches_path(entry.path()))
}

fn to_walked(entry: DirEntry) -> Option<WalkedEntry> {
    let metadata = match entry.metadata() {
        Ok(m) => m,
        Err(err) => {
            warn!("Error getting metadata for {}: {}", entry.path().display(), err);
            return None;
        }
    };

    let is_dir = metadata.is_dir();
    Some(WalkedEntry {
        size: if is_dir { 0 } else { metadata.len() },
        modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        is_dir,
        is_file: metadata.file_type().is_file(),
        path: entry.into_path(),
    })
}
