use anyhow::{bail, Context, Result};
use cairn_core::{mirror_entries, Catalog, Database};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Arguments for `rsync`: archive mode, contents of `source_root` into `target_root`.
pub fn rsync_args(source_root: &str, target_root: &str, delete_extra: bool) -> Vec<String> {
    let mut args = vec!["-avh".to_string(), "--progress".to_string()];
    if delete_extra {
        args.push("--delete".to_string());
    }
    let mut source = source_root.to_string();
    if !source.ends_with('/') {
        source.push('/');
    }
    args.push(source);
    args.push(target_root.to_string());
    args
}

/// Create the target root and any missing parents; rsync only creates the last component.
fn prepare_target(target_root: &Path) -> Result<()> {
    fs::create_dir_all(target_root)
        .with_context(|| format!("failed to create target root {}", target_root.display()))
}

/// Copy `source`'s tree onto `target`'s root with rsync, then record the
/// source entries under the target catalog.
pub fn sync_catalogs(
    db: &Database,
    source: &Catalog,
    target: &Catalog,
    delete_extra: bool,
) -> Result<usize> {
    if !Path::new(&source.root_path).is_dir() {
        bail!("source root {} is not a directory", source.root_path);
    }

    prepare_target(Path::new(&target.root_path))?;

    let args = rsync_args(&source.root_path, &target.root_path, delete_extra);
    println!("\nRunning rsync {}", args.join(" "));
    let status = Command::new("rsync")
        .args(&args)
        .status()
        .context("failed to run rsync; is it installed and on PATH?")?;
    if !status.success() {
        bail!("rsync exited with {}", status);
    }

    info!("Updating catalog {} with synced entries", target.name);
    let written = mirror_entries(db, &source.id, &target.id, Path::new(&target.root_path))?;
    Ok(written)
}
