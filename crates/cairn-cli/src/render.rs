use crate::commands::OutputFormat;
use anyhow::Result;
use cairn_core::storage::StoreSummary;
use cairn_core::{Catalog, ComparisonResult, DuplicateGroups, Entry, EntryWithCatalog, KindFilter};
use chrono::{DateTime, Local, Utc};
use colored::*;
use indicatif::HumanBytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

const PREVIEW_LIMIT: usize = 10;
const DUPLICATE_SET_LIMIT: usize = 20;

fn short_fingerprint(fingerprint: Option<&str>) -> String {
    match fingerprint {
        None | Some("") => "-".to_string(),
        Some(fp) if fp.len() > 12 => format!("{}...", &fp[..12]),
        Some(fp) => fp.to_string(),
    }
}

fn local_time(t: &DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn last_sync(catalog: &Catalog) -> String {
    catalog
        .last_sync
        .as_ref()
        .map(local_time)
        .unwrap_or_else(|| "Never".to_string())
}

/// Column-aligned text table.
struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn print(&self) {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{:<w$}", h, w = *w))
            .collect();
        println!("{}", header.join("   ").trim_end().bold());
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<w$}", c, w = *w))
                .collect();
            println!("{}", cells.join("   ").trim_end());
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    serde_json::to_writer_pretty(io::stdout().lock(), value)?;
    println!();
    Ok(())
}

fn write_csv(headers: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout().lock());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn print_catalogs(catalogs: &[Catalog], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => return print_json(catalogs),
        OutputFormat::Csv => {
            return write_csv(
                &["id", "name", "root_path", "machine_id", "entries", "size", "last_sync"],
                catalogs.iter().map(|c| {
                    vec![
                        c.id.clone(),
                        c.name.clone(),
                        c.root_path.clone(),
                        c.machine_id.clone(),
                        c.total_entries.to_string(),
                        c.total_size.to_string(),
                        c.last_sync.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    ]
                }),
            )
        }
        OutputFormat::Table => {}
    }

    if catalogs.is_empty() {
        println!("No catalogs found.");
        return Ok(());
    }
    let mut table = Table::new(vec!["ID", "NAME", "PATH", "ENTRIES", "SIZE", "LAST SYNC"]);
    for catalog in catalogs {
        table.push(catalog_row(catalog));
    }
    table.print();
    Ok(())
}

fn catalog_row(catalog: &Catalog) -> Vec<String> {
    vec![
        catalog.short_id().to_string(),
        catalog.name.clone(),
        catalog.root_path.clone(),
        catalog.total_entries.to_string(),
        HumanBytes(catalog.total_size).to_string(),
        last_sync(catalog),
    ]
}

pub fn print_catalog_files(catalog: &Catalog, entries: &[Entry], format: OutputFormat) -> Result<()> {
    let files: Vec<&Entry> = entries.iter().filter(|e| !e.is_dir).collect();
    match format {
        OutputFormat::Json => return print_json(&files),
        OutputFormat::Csv => {
            return write_csv(
                &["relative_path", "size", "modified", "fingerprint"],
                files.iter().map(|e| {
                    vec![
                        e.relative_path.clone(),
                        e.size.to_string(),
                        e.modified.to_rfc3339(),
                        e.fingerprint.clone().unwrap_or_default(),
                    ]
                }),
            )
        }
        OutputFormat::Table => {}
    }

    println!("Catalog: {} ({})", catalog.name.cyan(), catalog.root_path);
    println!("Total files: {}\n", files.len());
    let mut table = Table::new(vec!["PATH", "SIZE", "MODIFIED", "CHECKSUM"]);
    for entry in files {
        table.push(vec![
            entry.relative_path.clone(),
            HumanBytes(entry.size).to_string(),
            local_time(&entry.modified),
            short_fingerprint(entry.fingerprint.as_deref()),
        ]);
    }
    table.print();
    Ok(())
}

pub fn print_catalog_details(catalog: &Catalog, entries: &[Entry]) {
    let (files, dirs): (Vec<&Entry>, Vec<&Entry>) = entries.iter().partition(|e| !e.is_dir);
    let fingerprinted = files.iter().filter(|e| e.has_fingerprint()).count();
    let size: u64 = files.iter().map(|e| e.size).sum();

    println!("{}", "Catalog Details".bold());
    println!("===============\n");
    println!("ID:          {}", catalog.id);
    println!("Name:        {}", catalog.name.cyan());
    println!("Root Path:   {}", catalog.root_path);
    println!("Machine ID:  {}", catalog.machine_id);
    println!("Created:     {}", local_time(&catalog.created_at));
    println!("Last Sync:   {}", last_sync(catalog));
    println!("\n{}", "Statistics".bold());
    println!("----------");
    println!("Files:        {}", files.len());
    println!("Directories:  {}", dirs.len());
    println!("Fingerprinted: {}", fingerprinted);
    println!("Total Size:   {}", HumanBytes(size));
}

fn preview(title: &str, marker: ColoredString, entries: &[Entry], with_size: bool) {
    if entries.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for entry in entries.iter().take(PREVIEW_LIMIT) {
        if with_size {
            println!("  {} {} ({})", marker, entry.relative_path, HumanBytes(entry.size));
        } else {
            println!("  {} {}", marker, entry.relative_path);
        }
    }
    if entries.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", entries.len() - PREVIEW_LIMIT);
    }
}

pub fn print_comparison(
    result: &ComparisonResult,
    source: &Catalog,
    target: &Catalog,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => return print_json(result),
        OutputFormat::Csv => {
            let rows = [("new", &result.new), ("updated", &result.updated), ("deleted", &result.deleted)]
                .into_iter()
                .flat_map(|(status, entries)| {
                    entries.iter().map(move |e| {
                        vec![
                            status.to_string(),
                            e.relative_path.clone(),
                            e.size.to_string(),
                            e.fingerprint.clone().unwrap_or_default(),
                        ]
                    })
                });
            return write_csv(&["status", "relative_path", "size", "fingerprint"], rows);
        }
        OutputFormat::Table => {}
    }

    println!("\n{}", "=== Comparison ===".bold());
    println!("Source: {} ({})", source.name.cyan(), source.root_path);
    println!("Target: {} ({})", target.name.cyan(), target.root_path);
    println!("\nNew files:       {}", result.new.len().to_string().green());
    println!("Updated files:   {}", result.updated.len().to_string().yellow());
    println!("Deleted files:   {}", result.deleted.len().to_string().red());
    println!("Already present: {}", result.duplicates.len());
    println!("To transfer:     {}", HumanBytes(result.transfer_bytes()));

    preview("New files", "+".green(), &result.new, true);
    preview("Updated files", "~".yellow(), &result.updated, false);
    preview("Deleted files", "-".red(), &result.deleted, false);

    if !result.duplicates.is_empty() {
        println!("\nNew files whose content already exists in the target:");
        for (relative, copies) in result.duplicates.iter().take(PREVIEW_LIMIT) {
            let existing: Vec<&str> = copies.iter().map(|e| e.relative_path.as_str()).collect();
            println!("  = {} -> {}", relative, existing.join(", "));
        }
    }

    if result.is_identical() {
        println!("\n{}", "Catalogs are identical.".green());
    }
    Ok(())
}

/// Print duplicate groups; `names` maps catalog ids to display names.
pub fn print_duplicates(
    groups: &DuplicateGroups,
    names: &BTreeMap<String, String>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => return print_json(groups),
        OutputFormat::Csv => {
            let rows = groups.iter().flat_map(|(fp, entries)| {
                entries.iter().map(move |e| {
                    vec![
                        fp.to_string(),
                        names.get(&e.catalog_id).cloned().unwrap_or_default(),
                        e.path.clone(),
                        e.size.to_string(),
                    ]
                })
            });
            return write_csv(&["fingerprint", "catalog", "path", "size"], rows);
        }
        OutputFormat::Table => {}
    }

    if groups.is_empty() {
        println!("No duplicate files found.");
        return Ok(());
    }

    println!(
        "Found {} sets of duplicate files ({} reclaimable):\n",
        groups.len().to_string().red(),
        HumanBytes(groups.wasted_bytes()).to_string().red()
    );
    for (shown, (fingerprint, entries)) in groups.iter().enumerate() {
        if shown >= DUPLICATE_SET_LIMIT {
            println!("... and {} more duplicate sets", groups.len() - shown);
            break;
        }
        println!(
            "Checksum: {} ({} copies)",
            short_fingerprint(Some(fingerprint)),
            entries.len()
        );
        for entry in entries {
            let catalog = names
                .get(&entry.catalog_id)
                .map(String::as_str)
                .unwrap_or(&entry.catalog_id);
            println!("  - {} [{}]", entry.path, catalog.cyan());
        }
        println!();
    }
    Ok(())
}

pub fn print_search_results(
    results: &[EntryWithCatalog],
    kind: KindFilter,
    grouped: bool,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => return print_json(results),
        OutputFormat::Csv => {
            return write_csv(
                &["catalog", "relative_path", "path", "size", "modified", "fingerprint", "is_dir"],
                results.iter().map(|r| {
                    vec![
                        r.catalog_name.clone(),
                        r.entry.relative_path.clone(),
                        r.entry.path.clone(),
                        r.entry.size.to_string(),
                        r.entry.modified.to_rfc3339(),
                        r.entry.fingerprint.clone().unwrap_or_default(),
                        r.entry.is_dir.to_string(),
                    ]
                }),
            )
        }
        OutputFormat::Table => {}
    }

    if results.is_empty() {
        println!("No files found matching the criteria.");
        return Ok(());
    }

    if grouped {
        print_grouped_by_fingerprint(results);
        return Ok(());
    }

    let label = match kind {
        KindFilter::Files => "files",
        KindFilter::Directories => "directories",
        KindFilter::All => "items",
    };
    println!("Found {} {}\n", results.len(), label);
    let mut table = Table::new(vec!["PATH", "SIZE", "MODIFIED", "CHECKSUM", "CATALOG"]);
    for result in results {
        let size = if result.entry.is_dir {
            "-".to_string()
        } else {
            HumanBytes(result.entry.size).to_string()
        };
        table.push(vec![
            result.entry.relative_path.clone(),
            size,
            local_time(&result.entry.modified),
            short_fingerprint(result.entry.fingerprint.as_deref()),
            result.catalog_name.clone(),
        ]);
    }
    table.print();
    Ok(())
}

fn print_grouped_by_fingerprint(results: &[EntryWithCatalog]) {
    let mut sets: BTreeMap<&str, BTreeMap<(&str, &str), Vec<&Entry>>> = BTreeMap::new();
    for result in results {
        if let Some(fp) = result.entry.fingerprint.as_deref().filter(|fp| !fp.is_empty()) {
            sets.entry(fp)
                .or_default()
                .entry((result.catalog_name.as_str(), result.catalog_root.as_str()))
                .or_default()
                .push(&result.entry);
        }
    }

    println!(
        "Found {} duplicate set(s) ({} files total)\n",
        sets.len(),
        results.len()
    );
    for (fingerprint, by_catalog) in &sets {
        let copies: usize = by_catalog.values().map(Vec::len).sum();
        println!("{}", "========================================".dimmed());
        println!(
            "Checksum: {} ({} copies)",
            short_fingerprint(Some(*fingerprint)),
            copies
        );
        println!("{}", "========================================".dimmed());
        for ((name, root), entries) in by_catalog {
            println!("\n{} ({})", name.cyan(), root);
            for entry in entries {
                println!(
                    "  • {} ({}, {})",
                    entry.relative_path,
                    HumanBytes(entry.size).to_string(),
                    local_time(&entry.modified)
                );
            }
        }
        println!();
    }
}

pub fn print_store_stats(
    database_path: &Path,
    summary: &StoreSummary,
    catalogs: &[Catalog],
) -> Result<()> {
    let metadata = std::fs::metadata(database_path)?;

    println!("{}", "Database Statistics".bold());
    println!("===================\n");
    println!("Database Path:   {}", database_path.display());
    println!("Database Size:   {}", HumanBytes(metadata.len()));
    if let Ok(modified) = metadata.modified() {
        println!("Last Modified:   {}", local_time(&DateTime::<Utc>::from(modified)));
    }
    println!();
    println!("Catalogs:        {}", summary.catalogs);
    println!("Entries:         {}", summary.entries);
    println!("Size Cataloged:  {}", HumanBytes(summary.total_size));

    if !catalogs.is_empty() {
        println!("\n{}", "Catalog Breakdown".bold());
        println!("-----------------\n");
        let mut table = Table::new(vec!["NAME", "ENTRIES", "SIZE", "LAST SYNC"]);
        for catalog in catalogs {
            table.push(vec![
                catalog.name.clone(),
                catalog.total_entries.to_string(),
                HumanBytes(catalog.total_size).to_string(),
                last_sync(catalog),
            ]);
        }
        table.print();
    }
    Ok(())
}
