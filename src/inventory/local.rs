use super::db::{self, FileRow};
use crate::config::{self, EXCLUDED_EXTENSIONS, EXCLUDED_FOLDERS};
use anyhow::Result;
use log::{error, info};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Rows buffered per insert transaction while indexing.
const INSERT_BATCH: usize = 500;

/// Builds the local inventory database for the selected paths.
///
/// Walks each selected sub-tree under the media root and records one row
/// per regular file, keyed by the path relative to the media root with its
/// leading `/` retained. Dot-files, subtitle sidecars, and excluded folders
/// are left out, so a purge can never touch them.
///
/// # Arguments
///
/// * `db_path` - Where to create `.localfiles.db`.
/// * `media` - The media root.
/// * `paths` - The encoded selected paths.
///
/// # Returns
///
/// * `Ok(())` - Inventory complete.
/// * `Err(anyhow::Error)` - A database failure; the inventory must be
///   complete for the purge to be correct, so this aborts the run.
pub fn build(db_path: &Path, media: &Path, paths: &[String]) -> Result<()> {
    let mut conn = db::open(db_path)?;
    for path in paths {
        let folder = media.join(config::decode_path(path)?);
        info!("Indexing {}", folder.display());
        index_folder(&mut conn, &folder, media)?;
    }
    Ok(())
}

/// Walks one folder and inserts its eligible files in batches.
fn index_folder(conn: &mut rusqlite::Connection, folder: &Path, media: &Path) -> Result<()> {
    let mut batch: Vec<FileRow> = Vec::new();
    let walker = WalkDir::new(folder)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Walk error under {}: {}", folder.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = match entry.file_name().to_str() {
            Some(name) => name,
            None => {
                error!("Skipping non-UTF-8 filename {:?}", entry.file_name());
                continue;
            }
        };
        if !keep_file(name) {
            continue;
        }
        let rel = match rel_key(entry.path(), media) {
            Some(rel) => rel,
            None => {
                error!("Skipping non-UTF-8 path {:?}", entry.path());
                continue;
            }
        };
        batch.push((rel, None, None));
        if batch.len() >= INSERT_BATCH {
            db::insert_files(conn, &batch)?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        db::insert_files(conn, &batch)?;
    }
    Ok(())
}

/// Whether a directory entry is pruned from the walk.
fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| EXCLUDED_FOLDERS.contains(&name))
}

/// Whether a file basename belongs in the inventory.
fn keep_file(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    let lower = name.to_lowercase();
    !EXCLUDED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// The inventory key: path relative to the media root, leading `/` retained.
fn rel_key(path: &Path, media: &Path) -> Option<String> {
    let rel = path.strip_prefix(media).ok()?;
    Some(format!("/{}", rel.to_str()?))
}
