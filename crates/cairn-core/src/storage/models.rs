use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// One scanned root location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    pub root_path: String,
    pub machine_id: String,
    pub created_at: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
    pub total_entries: u64,
    pub total_size: u64,
}

impl Catalog {
    /// A fresh catalog for `root_path` on `machine_id`, with zeroed aggregates.
    pub fn new(name: &str, root_path: &str, machine_id: &str) -> Self {
        Self {
            id: catalog_id(machine_id, root_path),
            name: name.to_string(),
            root_path: root_path.to_string(),
            machine_id: machine_id.to_string(),
            created_at: Utc::now(),
            last_sync: None,
            total_entries: 0,
            total_size: 0,
        }
    }

    /// First twelve characters of the id, enough to be unambiguous in listings.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }
}

/// Derive the catalog identifier for a root on a machine.
///
/// The first 16 bytes of BLAKE3 over `"{machine}:{root}"`, hex encoded, so
/// re-indexing the same path on the same machine yields the same catalog.
pub fn catalog_id(machine_id: &str, root_path: &str) -> String {
    let hash = blake3::hash(format!("{}:{}", machine_id, root_path).as_bytes());
    hash.to_hex().as_str()[..32].to_string()
}

/// A file or directory known to a catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub path: String,
    pub relative_path: String,
    pub size: u64,
    /// Modification time, held at whole-second resolution.
    pub modified: DateTime<Utc>,
    /// `None` when the content fingerprint was never computed.
    pub fingerprint: Option<String>,
    pub catalog_id: String,
    pub last_seen: DateTime<Utc>,
    pub is_dir: bool,
}

impl Entry {
    /// Compare modification times the way the reconciler and differ do: whole seconds only.
    pub fn same_mtime(&self, other: &DateTime<Utc>) -> bool {
        self.modified.timestamp() == other.timestamp()
    }

    pub fn has_fingerprint(&self) -> bool {
        self.fingerprint.as_deref().is_some_and(|fp| !fp.is_empty())
    }
}

/// A search hit together with the owning catalog's display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryWithCatalog {
    #[serde(flatten)]
    pub entry: Entry,
    pub catalog_name: String,
    pub catalog_root: String,
}

/// Store-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSummary {
    pub catalogs: u64,
    pub entries: u64,
    pub total_size: u64,
}

pub(crate) fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}
