//! Structured search over every catalog in the store.
//!
//! [`FindOptions`] is translated into a [`SearchPredicate`], a conjunction of
//! SQL clauses with bound parameters, which [`Database::search`] evaluates.

pub mod parse;

pub use parse::{parse_date, parse_date_at, parse_size_filter};

use crate::error::Error;
use crate::storage::{Database, EntryWithCatalog};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Restrict results to files, directories, or both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindFilter {
    Files,
    Directories,
    #[default]
    All,
}

impl FromStr for KindFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "files" => Ok(KindFilter::Files),
            "dir" | "dirs" | "directory" | "directories" => Ok(KindFilter::Directories),
            "" | "all" => Ok(KindFilter::All),
            other => Err(Error::InvalidFilter(format!(
                "unknown type '{}': expected file, dir, directory or all",
                other
            ))),
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KindFilter::Files => "file",
            KindFilter::Directories => "dir",
            KindFilter::All => "all",
        };
        f.write_str(name)
    }
}

/// Every field is optional; supplied ones are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Shell-style glob (`*`, `?`) over the relative path.
    pub name_pattern: Option<String>,
    /// Shell-style glob matched as a path segment anywhere in the relative path.
    pub dir_pattern: Option<String>,
    pub fingerprint: Option<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    /// Catalog ids to search; empty means all catalogs.
    pub catalog_ids: Vec<String>,
    pub modified_since: Option<DateTime<Utc>>,
    pub modified_until: Option<DateTime<Utc>>,
    pub kind: KindFilter,
    /// Only entries whose fingerprint appears more than once in the whole store.
    pub only_duplicates: bool,
}

impl FindOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if let (Some(since), Some(until)) = (self.modified_since, self.modified_until) {
            if since > until {
                return Err(Error::InvalidFilter(
                    "--since date must be before --until date".to_string(),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(Error::InvalidFilter(format!(
                    "minimum size {} exceeds maximum size {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    pub fn to_predicate(&self) -> Result<SearchPredicate, Error> {
        self.validate()?;
        let mut predicate = SearchPredicate::default();

        if let Some(pattern) = non_empty(&self.name_pattern) {
            predicate.push(
                "e.relative_path LIKE ? ESCAPE '\\'",
                vec![Value::Text(glob_to_like(pattern))],
            );
        }

        if let Some(pattern) = non_empty(&self.dir_pattern) {
            let like = glob_to_like(pattern);
            predicate.push(
                "(e.relative_path LIKE ? || '/%' ESCAPE '\\' \
                 OR e.relative_path LIKE '%/' || ? || '/%' ESCAPE '\\' \
                 OR e.relative_path LIKE '%/' || ? ESCAPE '\\' \
                 OR e.relative_path LIKE ? ESCAPE '\\')",
                vec![Value::Text(like); 4],
            );
        }

        if let Some(fingerprint) = non_empty(&self.fingerprint) {
            predicate.push(
                "e.fingerprint = ?",
                vec![Value::Text(fingerprint.to_string())],
            );
        }

        if let Some(min) = self.min_size {
            predicate.push("e.size >= ?", vec![Value::Integer(clamp_i64(min))]);
        }
        if let Some(max) = self.max_size {
            predicate.push("e.size <= ?", vec![Value::Integer(clamp_i64(max))]);
        }

        match self.kind {
            KindFilter::Files => predicate.push("e.is_dir = 0", vec![]),
            KindFilter::Directories => predicate.push("e.is_dir = 1", vec![]),
            KindFilter::All => {}
        }

        if let Some(since) = self.modified_since {
            predicate.push("e.modified >= ?", vec![Value::Integer(since.timestamp())]);
        }
        if let Some(until) = self.modified_until {
            predicate.push("e.modified <= ?", vec![Value::Integer(until.timestamp())]);
        }

        if !self.catalog_ids.is_empty() {
            let placeholders = vec!["?"; self.catalog_ids.len()].join(", ");
            predicate.push(
                &format!("e.catalog_id IN ({})", placeholders),
                self.catalog_ids
                    .iter()
                    .map(|id| Value::Text(id.clone()))
                    .collect(),
            );
        }

        if self.only_duplicates {
            predicate.push(
                "e.fingerprint IN (SELECT fingerprint FROM entry \
                 WHERE fingerprint IS NOT NULL AND fingerprint != '' \
                 GROUP BY fingerprint HAVING COUNT(*) > 1)",
                vec![],
            );
        }

        Ok(predicate)
    }
}

/// A conjunction of SQL clauses over `entry e JOIN catalog c`, with positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPredicate {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SearchPredicate {
    fn push(&mut self, clause: &str, params: Vec<Value>) {
        self.clauses.push(clause.to_string());
        self.params.extend(params);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn where_clause(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" AND "))
        }
    }
}

/// Search every catalog, ordered by catalog name then path.
pub fn find(db: &Database, options: &FindOptions) -> Result<Vec<EntryWithCatalog>, Error> {
    let predicate = options.to_predicate()?;
    debug!("Find with {} clauses", predicate.clauses().len());
    db.search(&predicate)
}

/// Translate a shell glob into a `LIKE` pattern using `\` as the escape character.
///
/// The store's own wildcards (`%`, `_`) and the escape character are escaped
/// first, so they match literally; only then do `*` and `?` become `%` and `_`.
pub fn glob_to_like(pattern: &str) -> String {
    let escaped = pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    escaped.replace('*', "%").replace('?', "_")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_glob_to_like_wildcards() {
        assert_eq!(glob_to_like("*.txt"), "%.txt");
        assert_eq!(glob_to_like("file?.log"), "file_.log");
        assert_eq!(glob_to_like("plain"), "plain");
    }

    #[test]
    fn test_glob_to_like_escapes_before_substituting() {
        assert_eq!(glob_to_like("100%_done*"), "100\\%\\_done%");
        assert_eq!(glob_to_like("a\\b"), "a\\\\b");
        // The `_` produced by `?` must stay unescaped.
        assert_eq!(glob_to_like("a_?"), "a\\__");
    }

    #[test]
    fn test_kind_filter_parsing() {
        assert_eq!("file".parse::<KindFilter>().unwrap(), KindFilter::Files);
        assert_eq!("dir".parse::<KindFilter>().unwrap(), KindFilter::Directories);
        assert_eq!("Directory".parse::<KindFilter>().unwrap(), KindFilter::Directories);
        assert_eq!("all".parse::<KindFilter>().unwrap(), KindFilter::All);
        assert!("socket".parse::<KindFilter>().is_err());
    }

    #[test]
    fn test_empty_options_have_no_clauses() {
        let predicate = FindOptions::default().to_predicate().unwrap();
        assert!(predicate.is_empty());
        assert_eq!(predicate.where_clause(), None);
    }

    #[test]
    fn test_predicate_params_follow_clause_order() {
        let options = FindOptions {
            name_pattern: Some("*.txt".into()),
            min_size: Some(100),
            max_size: Some(200),
            catalog_ids: vec!["a".into(), "b".into()],
            kind: KindFilter::Files,
            ..Default::default()
        };
        let predicate = options.to_predicate().unwrap();
        assert_eq!(predicate.clauses().len(), 5);
        assert_eq!(
            predicate.params(),
            &[
                Value::Text("%.txt".into()),
                Value::Integer(100),
                Value::Integer(200),
                Value::Text("a".into()),
                Value::Text("b".into()),
            ]
        );
        let sql = predicate.where_clause().unwrap();
        assert!(sql.contains("e.catalog_id IN (?, ?)"));
        assert_eq!(sql.matches(" AND ").count(), 4);
    }

    #[test]
    fn test_inverted_ranges_are_rejected() {
        let options = FindOptions {
            min_size: Some(10),
            max_size: Some(5),
            ..Default::default()
        };
        assert!(matches!(options.to_predicate(), Err(Error::InvalidFilter(_))));
    }

    fn unescape_like(like: &str) -> String {
        let mut out = String::new();
        let mut chars = like.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    proptest! {
        #[test]
        fn prop_literal_patterns_round_trip(pattern in "[a-z0-9%_\\\\. /-]{0,24}") {
            // No glob wildcards: every character must come back out literally.
            let like = glob_to_like(&pattern);
            prop_assert_eq!(unescape_like(&like), pattern);
        }

        #[test]
        fn prop_no_bare_store_wildcards_from_literals(pattern in "[a-z%_\\\\]{0,24}") {
            let like = glob_to_like(&pattern);
            let mut chars = like.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    prop_assert!(chars.next().is_some());
                } else {
                    prop_assert!(c != '%' && c != '_');
                }
            }
        }
    }
}
