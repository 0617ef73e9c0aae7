use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cairn")]
#[command(about = "Catalog directory trees and compare them across machines", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog database to use (overrides configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a catalog for a directory and scan it
    Index {
        path: PathBuf,
        /// Catalog name (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,
        /// Compute content fingerprints (slower, enables duplicate detection)
        #[arg(short = 'c', long)]
        checksums: bool,
        /// Rescan even if a catalog for this path already exists
        #[arg(short, long)]
        force: bool,
    },
    /// Bring an existing catalog up to date with its directory
    Reindex {
        catalog: String,
        #[arg(short = 'c', long)]
        checksums: bool,
    },
    /// List all catalogs
    List {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// List the files of one catalog
    Files {
        catalog: String,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show details and statistics for one catalog
    Show { catalog: String },
    /// Delete catalogs and their entries (files on disk are untouched)
    Remove {
        #[arg(required = true)]
        catalogs: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Compare two catalogs by relative path
    Compare {
        source: String,
        target: String,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Copy a source catalog's tree onto a target's root with rsync, then record it
    Sync {
        source: String,
        target: String,
        /// Show the comparison without copying anything
        #[arg(short = 'd', long)]
        dry_run: bool,
        /// Delete target files that do not exist in the source
        #[arg(long)]
        delete: bool,
    },
    /// Group identical files across all catalogs
    Duplicates {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Search every catalog
    Find(FindArgs),
    /// Show database location, size and per-catalog totals
    Stat,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, clap::Args)]
pub struct FindArgs {
    /// Relative path pattern (supports * and ?)
    #[arg(short, long)]
    pub name: Option<String>,
    /// Directory name pattern, matched as a path segment
    #[arg(short = 'D', long)]
    pub dir: Option<String>,
    /// Exact content fingerprint
    #[arg(short = 'c', long)]
    pub checksum: Option<String>,
    /// Size filter such as >100M, <1G, =500K
    #[arg(short, long)]
    pub size: Option<String>,
    /// Limit to these catalogs (name or id; repeatable)
    #[arg(short = 'i', long = "catalog")]
    pub catalogs: Vec<String>,
    /// Only files whose content appears more than once in the store
    #[arg(short, long)]
    pub duplicates: bool,
    /// Modified at or after, e.g. "2 weeks ago" or 2024-01-15
    #[arg(long)]
    pub since: Option<String>,
    /// Modified at or before, e.g. yesterday or 2024-01-20
    #[arg(long)]
    pub until: Option<String>,
    /// file, dir or all
    #[arg(short = 't', long = "type", default_value = "all")]
    pub kind: String,
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}
