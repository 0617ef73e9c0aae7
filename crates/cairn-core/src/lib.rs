pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod platform;
pub mod progress;
pub mod query;
pub mod scanner;
pub mod storage;

pub use analysis::{compare, find_duplicates, mirror_entries, ComparisonResult, DuplicateGroups};
pub use config::AppConfig;
pub use engine::{CatalogEngine, IndexOutcome};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use query::{find, FindOptions, KindFilter};
pub use scanner::{ReconcileStats, Reconciler, ScanStats, Scanner, TreeWalker, WalkOptions};
pub use storage::{Catalog, Database, Entry, EntryWithCatalog, StoreSummary};
