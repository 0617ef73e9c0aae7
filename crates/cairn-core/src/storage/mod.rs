pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{catalog_id, Catalog, Entry, EntryWithCatalog, StoreSummary};
pub use sqlite::Database;
