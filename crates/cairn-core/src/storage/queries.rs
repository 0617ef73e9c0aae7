use super::models::*;
use super::sqlite::Database;
use crate::error::Error;
use crate::query::SearchPredicate;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

const CATALOG_COLUMNS: &str =
    "id, name, root_path, machine_id, created_at, last_sync, total_entries, total_size";

const ENTRY_COLUMNS: &str =
    "path, relative_path, size, modified, fingerprint, catalog_id, last_seen, is_dir";

/// Shortest id prefix accepted when resolving a catalog by partial id.
pub const MIN_ID_PREFIX: usize = 8;

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn catalog_from_row(row: &Row<'_>) -> rusqlite::Result<Catalog> {
    let created_at: String = row.get(4)?;
    let last_sync: Option<String> = row.get(5)?;
    Ok(Catalog {
        id: row.get(0)?,
        name: row.get(1)?,
        root_path: row.get(2)?,
        machine_id: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
        last_sync: last_sync
            .as_deref()
            .map(|raw| parse_timestamp(5, raw))
            .transpose()?,
        total_entries: row.get::<_, i64>(6)? as u64,
        total_size: row.get::<_, i64>(7)? as u64,
    })
}

/// Map an entry row whose first eight columns are `ENTRY_COLUMNS`.
fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let last_seen: String = row.get(6)?;
    Ok(Entry {
        path: row.get(0)?,
        relative_path: row.get(1)?,
        size: row.get::<_, i64>(2)? as u64,
        modified: from_unix_secs(row.get(3)?),
        fingerprint: row.get(4)?,
        catalog_id: row.get(5)?,
        last_seen: parse_timestamp(6, &last_seen)?,
        is_dir: row.get(7)?,
    })
}

impl Database {
    // ── Catalogs ─────────────────────────────────────────────────

    pub fn create_catalog(&self, catalog: &Catalog) -> Result<(), Error> {
        self.connection().execute(
            "INSERT INTO catalog (id, name, root_path, machine_id, created_at, last_sync, \
             total_entries, total_size) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                catalog.id,
                catalog.name,
                catalog.root_path,
                catalog.machine_id,
                catalog.created_at.to_rfc3339(),
                catalog.last_sync.map(|t| t.to_rfc3339()),
                catalog.total_entries as i64,
                catalog.total_size as i64,
            ],
        )?;
        debug!("Created catalog {} ({})", catalog.name, catalog.id);
        Ok(())
    }

    pub fn get_catalog(&self, id: &str) -> Result<Catalog, Error> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM catalog WHERE id = ?1", CATALOG_COLUMNS),
                params![id],
                catalog_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::CatalogNotFound(id.to_string()))
    }

    /// Resolve an identifier by exact id, then exact name, then id prefix of
    /// at least [`MIN_ID_PREFIX`] characters.
    pub fn find_catalog_by_name_or_id(&self, identifier: &str) -> Result<Catalog, Error> {
        match self.get_catalog(identifier) {
            Ok(catalog) => return Ok(catalog),
            Err(Error::CatalogNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let by_name = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM catalog WHERE name = ?1 ORDER BY created_at LIMIT 1",
                    CATALOG_COLUMNS
                ),
                params![identifier],
                catalog_from_row,
            )
            .optional()?;
        if let Some(catalog) = by_name {
            return Ok(catalog);
        }

        if identifier.chars().count() >= MIN_ID_PREFIX {
            let by_prefix = self
                .connection()
                .query_row(
                    &format!(
                        "SELECT {} FROM catalog WHERE substr(id, 1, ?2) = ?1 ORDER BY id LIMIT 1",
                        CATALOG_COLUMNS
                    ),
                    params![identifier, identifier.chars().count() as i64],
                    catalog_from_row,
                )
                .optional()?;
            if let Some(catalog) = by_prefix {
                return Ok(catalog);
            }
        }

        Err(Error::CatalogNotFound(identifier.to_string()))
    }

    /// All catalogs, newest first.
    pub fn list_catalogs(&self) -> Result<Vec<Catalog>, Error> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM catalog ORDER BY created_at DESC, name",
            CATALOG_COLUMNS
        ))?;
        let catalogs = stmt
            .query_map([], catalog_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(catalogs)
    }

    /// Delete a catalog; its entries go with it via `ON DELETE CASCADE`.
    pub fn delete_catalog(&self, id: &str) -> Result<(), Error> {
        let removed = self
            .connection()
            .execute("DELETE FROM catalog WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(Error::CatalogNotFound(id.to_string()));
        }
        debug!("Deleted catalog {}", id);
        Ok(())
    }

    /// Recount entries and bytes (files only) for a catalog and stamp `last_sync`.
    pub fn recompute_aggregates(&self, catalog_id: &str) -> Result<(), Error> {
        let updated = self.connection().execute(
            "UPDATE catalog SET \
                 total_entries = (SELECT COUNT(*) FROM entry WHERE catalog_id = ?1), \
                 total_size = (SELECT COALESCE(SUM(size), 0) FROM entry \
                               WHERE catalog_id = ?1 AND is_dir = 0), \
                 last_sync = ?2 \
             WHERE id = ?1",
            params![catalog_id, Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(Error::CatalogNotFound(catalog_id.to_string()));
        }
        Ok(())
    }

    pub fn store_summary(&self) -> Result<StoreSummary, Error> {
        let summary = self.connection().query_row(
            "SELECT (SELECT COUNT(*) FROM catalog), \
                    (SELECT COUNT(*) FROM entry), \
                    (SELECT COALESCE(SUM(size), 0) FROM entry WHERE is_dir = 0)",
            [],
            |row| {
                Ok(StoreSummary {
                    catalogs: row.get::<_, i64>(0)? as u64,
                    entries: row.get::<_, i64>(1)? as u64,
                    total_size: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(summary)
    }

    // ── Entries ──────────────────────────────────────────────────

    /// Insert or refresh an entry keyed by `(path, catalog_id)`.
    ///
    /// An existing row keeps its relative path; size, mtime, fingerprint,
    /// last-seen and the directory flag are overwritten.
    pub fn upsert_entry(&self, entry: &Entry) -> rusqlite::Result<()> {
        let mut stmt = self.connection().prepare_cached(
            "INSERT INTO entry \
             (path, relative_path, size, modified, fingerprint, catalog_id, last_seen, is_dir) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(path, catalog_id) DO UPDATE SET \
                 size = excluded.size, \
                 modified = excluded.modified, \
                 fingerprint = excluded.fingerprint, \
                 last_seen = excluded.last_seen, \
                 is_dir = excluded.is_dir",
        )?;
        stmt.execute(params![
            entry.path,
            entry.relative_path,
            entry.size as i64,
            entry.modified.timestamp(),
            entry.fingerprint,
            entry.catalog_id,
            entry.last_seen.to_rfc3339(),
            entry.is_dir,
        ])?;
        Ok(())
    }

    pub fn get_entry(&self, path: &str, catalog_id: &str) -> Result<Entry, Error> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {} FROM entry WHERE path = ?1 AND catalog_id = ?2",
                    ENTRY_COLUMNS
                ),
                params![path, catalog_id],
                entry_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::EntryNotFound {
                path: path.to_string(),
                catalog_id: catalog_id.to_string(),
            })
    }

    /// Every entry of a catalog, ordered by path.
    pub fn list_entries(&self, catalog_id: &str) -> Result<Vec<Entry>, Error> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM entry WHERE catalog_id = ?1 ORDER BY path",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![catalog_id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Remove one entry. Returns whether a row was actually deleted.
    pub fn delete_entry(&self, path: &str, catalog_id: &str) -> rusqlite::Result<bool> {
        let removed = self.connection().execute(
            "DELETE FROM entry WHERE path = ?1 AND catalog_id = ?2",
            params![path, catalog_id],
        )?;
        Ok(removed > 0)
    }

    /// Entries in any catalog carrying the given fingerprint.
    pub fn find_entries_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Entry>, Error> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM entry WHERE fingerprint = ?1 AND fingerprint != '' \
             ORDER BY catalog_id, path",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![fingerprint], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Evaluate a translated search predicate, ordered by catalog name then path.
    pub fn search(&self, predicate: &SearchPredicate) -> Result<Vec<EntryWithCatalog>, Error> {
        let mut sql = String::from(
            "SELECT e.path, e.relative_path, e.size, e.modified, e.fingerprint, \
                    e.catalog_id, e.last_seen, e.is_dir, c.name, c.root_path \
             FROM entry e JOIN catalog c ON e.catalog_id = c.id",
        );
        if let Some(clause) = predicate.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        sql.push_str(" ORDER BY c.name, e.path");
        debug!("Search SQL: {}", sql);

        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(predicate.params()), |row| {
                Ok(EntryWithCatalog {
                    entry: entry_from_row(row)?,
                    catalog_name: row.get(8)?,
                    catalog_root: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
