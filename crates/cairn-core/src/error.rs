use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The walk could not begin: the root is missing or unreadable.
    #[error("Cannot start walk at {path}: {source}")]
    Startup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single file could not be read or stat'ed.
    #[error("Cannot read {path}: {source}")]
    EntryRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The store rejected a write for one entry during a scan or reconcile.
    #[error("Failed to record {path}: {source}")]
    Record {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Catalog not found: {0}")]
    CatalogNotFound(String),

    #[error("Entry not found: {path} in catalog {catalog_id}")]
    EntryNotFound { path: String, catalog_id: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}
