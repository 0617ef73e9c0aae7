use crate::analysis::{self, ComparisonResult, DuplicateGroups};
use crate::config::AppConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::query::{self, FindOptions};
use crate::scanner::{ReconcileStats, Reconciler, ScanStats, Scanner};
use crate::storage::{catalog_id, Catalog, Database, EntryWithCatalog};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Ties the store, scanner, reconciler and analysis passes to one configuration.
pub struct CatalogEngine<'a> {
    db: &'a Database,
    config: &'a AppConfig,
}

#[derive(Debug)]
pub enum IndexOutcome {
    /// A new catalog was created and populated.
    Created { catalog: Catalog, stats: ScanStats },
    /// The catalog existed and `force` was set.
    Rescanned { catalog: Catalog, stats: ScanStats },
    /// The catalog existed and was left untouched.
    AlreadyIndexed(Catalog),
}

impl<'a> CatalogEngine<'a> {
    pub fn new(db: &'a Database, config: &'a AppConfig) -> Self {
        Self { db, config }
    }

    /// Index `root` under a catalog identified by this machine and the
    /// canonical root path. The name defaults to the root's final component.
    pub fn index(
        &self,
        root: &Path,
        name: Option<&str>,
        compute_fingerprints: bool,
        force: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<IndexOutcome, Error> {
        let root = fs::canonicalize(root).map_err(|source| Error::Startup {
            path: root.to_path_buf(),
            source,
        })?;
        let root_str = root.to_string_lossy().into_owned();
        let id = catalog_id(&self.config.machine_id, &root_str);

        let existing = match self.db.get_catalog(&id) {
            Ok(catalog) => Some(catalog),
            Err(Error::CatalogNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        if let Some(catalog) = &existing {
            if !force {
                info!("Catalog {} already covers {}", catalog.name, root_str);
                return Ok(IndexOutcome::AlreadyIndexed(catalog.clone()));
            }
        } else {
            let name = name
                .map(str::to_string)
                .or_else(|| {
                    root.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| root_str.clone());
            let catalog = Catalog::new(&name, &root_str, &self.config.machine_id);
            debug!("Creating catalog {} ({})", catalog.name, catalog.id);
            self.db.create_catalog(&catalog)?;
        }

        let stats = self
            .scanner(reporter)
            .scan(&id, &root, compute_fingerprints)?;
        let catalog = self.db.get_catalog(&id)?;

        Ok(match existing {
            Some(_) => IndexOutcome::Rescanned { catalog, stats },
            None => IndexOutcome::Created { catalog, stats },
        })
    }

    /// Bring an existing catalog in line with its root directory.
    pub fn reindex(
        &self,
        identifier: &str,
        compute_fingerprints: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<ReconcileStats, Error> {
        let catalog = self.resolve(identifier)?;
        Reconciler::new(self.db)
            .with_walk_options(self.config.walk_options())
            .with_reporter(reporter)
            .with_count_timeout(self.config.count_timeout())
            .reconcile(&catalog.id, Path::new(&catalog.root_path), compute_fingerprints)
    }

    pub fn resolve(&self, identifier: &str) -> Result<Catalog, Error> {
        self.db.find_catalog_by_name_or_id(identifier)
    }

    /// Delete a catalog and all of its entries, returning what was removed.
    pub fn remove(&self, identifier: &str) -> Result<Catalog, Error> {
        let catalog = self.resolve(identifier)?;
        self.db.delete_catalog(&catalog.id)?;
        info!("Removed catalog {} ({})", catalog.name, catalog.short_id());
        Ok(catalog)
    }

    pub fn compare(&self, source: &str, target: &str) -> Result<ComparisonResult, Error> {
        let source = self.resolve(source)?;
        let target = self.resolve(target)?;
        analysis::compare(self.db, &source.id, &target.id)
    }

    pub fn duplicates(&self) -> Result<DuplicateGroups, Error> {
        analysis::find_duplicates(self.db)
    }

    /// Run a search. Catalog filters may be names or ids; they are resolved first.
    pub fn find(&self, options: &FindOptions) -> Result<Vec<EntryWithCatalog>, Error> {
        if options.catalog_ids.is_empty() {
            return query::find(self.db, options);
        }
        let mut resolved = options.clone();
        resolved.catalog_ids = options
            .catalog_ids
            .iter()
            .map(|ident| self.resolve(ident).map(|c| c.id))
            .collect::<Result<_, _>>()?;
        query::find(self.db, &resolved)
    }

    fn scanner<'r>(&'r self, reporter: &'r dyn ProgressReporter) -> Scanner<'r> {
        Scanner::new(self.db)
            .with_walk_options(self.config.walk_options())
            .with_reporter(reporter)
            .with_count_timeout(self.config.count_timeout())
    }
}
