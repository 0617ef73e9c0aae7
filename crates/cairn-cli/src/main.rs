mod commands;
mod logging;
mod progress;
mod render;
mod sync;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use cairn_core::config::{load_configuration, load_configuration_from};
use cairn_core::query::{parse_date, parse_size_filter};
use cairn_core::{AppConfig, CatalogEngine, Database, FindOptions, IndexOutcome, KindFilter};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, FindArgs};
use dotenv::dotenv;
use indicatif::HumanBytes;
use progress::CliReporter;
use tracing::{debug, error};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let loaded = match &args.config {
        Some(path) => load_configuration_from(path),
        None => load_configuration(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, &config) {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    if let Commands::PrintConfig = command {
        println!("Configuration: {:#?}", config);
        return Ok(());
    }

    debug!("Opening catalog database {}", config.database_path.display());
    let db = Database::open(&config.database_path).with_context(|| {
        format!(
            "cannot open database {}",
            config.database_path.display()
        )
    })?;
    let engine = CatalogEngine::new(&db, config);

    match command {
        Commands::Index {
            path,
            name,
            checksums,
            force,
        } => run_index(&engine, &path, name.as_deref(), checksums, force),
        Commands::Reindex { catalog, checksums } => {
            let reporter = CliReporter::new();
            let stats = engine.reindex(&catalog, checksums, &reporter)?;
            println!(
                "\n{} {} added, {} updated, {} removed, {} unchanged",
                "Reindex complete:".green(),
                stats.added,
                stats.updated,
                stats.removed,
                stats.unchanged
            );
            Ok(())
        }
        Commands::List { format } => render::print_catalogs(&db.list_catalogs()?, format),
        Commands::Files { catalog, format } => {
            let catalog = engine.resolve(&catalog).map_err(with_lookup_hint)?;
            let entries = db.list_entries(&catalog.id)?;
            render::print_catalog_files(&catalog, &entries, format)
        }
        Commands::Show { catalog } => {
            let catalog = engine.resolve(&catalog).map_err(with_lookup_hint)?;
            let entries = db.list_entries(&catalog.id)?;
            render::print_catalog_details(&catalog, &entries);
            Ok(())
        }
        Commands::Remove { catalogs, force } => run_remove(&engine, &catalogs, force),
        Commands::Compare {
            source,
            target,
            format,
        } => {
            let source = engine.resolve(&source).map_err(with_lookup_hint)?;
            let target = engine.resolve(&target).map_err(with_lookup_hint)?;
            let result = engine.compare(&source.id, &target.id)?;
            render::print_comparison(&result, &source, &target, format)
        }
        Commands::Sync {
            source,
            target,
            dry_run,
            delete,
        } => {
            let source = engine.resolve(&source).map_err(with_lookup_hint)?;
            let target = engine.resolve(&target).map_err(with_lookup_hint)?;
            let result = engine.compare(&source.id, &target.id)?;
            render::print_comparison(&result, &source, &target, commands::OutputFormat::Table)?;

            if dry_run {
                println!("\n{}", "[DRY RUN] No changes made. Remove --dry-run to sync.".yellow());
                return Ok(());
            }
            let written = sync::sync_catalogs(&db, &source, &target, delete)?;
            println!(
                "\n{} {} entries recorded in {}",
                "Sync complete:".green(),
                written,
                target.name
            );
            Ok(())
        }
        Commands::Duplicates { format } => {
            let groups = engine.duplicates()?;
            let names: BTreeMap<String, String> = db
                .list_catalogs()?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect();
            render::print_duplicates(&groups, &names, format)
        }
        Commands::Find(args) => run_find(&engine, args),
        Commands::Stat => {
            let summary = db.store_summary()?;
            let catalogs = db.list_catalogs()?;
            render::print_store_stats(&config.database_path, &summary, &catalogs)
        }
        Commands::PrintConfig => Ok(()),
    }
}

fn with_lookup_hint(err: cairn_core::Error) -> anyhow::Error {
    match err {
        cairn_core::Error::CatalogNotFound(_) => anyhow::Error::new(err).context(
            "use a full id, an id prefix of at least 8 characters, or an exact name \
             (see 'cairn list')",
        ),
        other => other.into(),
    }
}

fn run_index(
    engine: &CatalogEngine<'_>,
    path: &std::path::Path,
    name: Option<&str>,
    checksums: bool,
    force: bool,
) -> Result<()> {
    let reporter = CliReporter::new();
    match engine.index(path, name, checksums, force, &reporter)? {
        IndexOutcome::AlreadyIndexed(catalog) => {
            println!("Catalog already exists: {} ({})", catalog.name.cyan(), catalog.short_id());
            println!("Use --force to rescan, or 'cairn reindex {}' to apply changes", catalog.name);
        }
        IndexOutcome::Created { catalog, stats } | IndexOutcome::Rescanned { catalog, stats } => {
            println!(
                "\n{} {} ({})",
                "Indexed".green(),
                catalog.name.cyan(),
                catalog.short_id()
            );
            println!(
                "  {} files, {} directories, {}",
                stats.files,
                stats.directories,
                HumanBytes(stats.total_size)
            );
        }
    }
    Ok(())
}

fn run_remove(engine: &CatalogEngine<'_>, identifiers: &[String], force: bool) -> Result<()> {
    let mut catalogs = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        catalogs.push(engine.resolve(identifier).map_err(with_lookup_hint)?);
    }

    println!("Catalogs to remove ({}):", catalogs.len());
    for catalog in &catalogs {
        println!(
            "  {} [{}] {} ({} entries)",
            catalog.name.cyan(),
            catalog.short_id(),
            catalog.root_path,
            catalog.total_entries
        );
    }
    println!("Files on disk will NOT be deleted.");

    if !force && !prompt_confirm("Remove these catalogs?", Some(false))? {
        println!("Nothing removed.");
        return Ok(());
    }

    let mut removed = 0;
    for catalog in &catalogs {
        match engine.remove(&catalog.id) {
            Ok(_) => {
                println!("{} Removed {} ({})", "✓".green(), catalog.name, catalog.root_path);
                removed += 1;
            }
            Err(e) => eprintln!("{} Failed to remove {}: {}", "✗".red(), catalog.name, e),
        }
    }
    if removed < catalogs.len() {
        anyhow::bail!("{} of {} catalogs removed", removed, catalogs.len());
    }
    Ok(())
}

fn find_options(args: &FindArgs) -> Result<FindOptions> {
    let (min_size, max_size) = match &args.size {
        Some(size) => parse_size_filter(size)?,
        None => (None, None),
    };
    let options = FindOptions {
        name_pattern: args.name.clone(),
        dir_pattern: args.dir.clone(),
        fingerprint: args.checksum.clone(),
        min_size,
        max_size,
        catalog_ids: args.catalogs.clone(),
        modified_since: args.since.as_deref().map(parse_date).transpose()?,
        modified_until: args.until.as_deref().map(parse_date).transpose()?,
        kind: args.kind.parse::<KindFilter>()?,
        only_duplicates: args.duplicates,
    };
    options.validate()?;
    Ok(options)
}

fn run_find(engine: &CatalogEngine<'_>, args: FindArgs) -> Result<()> {
    let options = find_options(&args)?;
    let results = engine.find(&options)?;
    render::print_search_results(&results, options.kind, args.duplicates, args.format)
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
