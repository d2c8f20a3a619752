use crate::config::{self, EXCLUDED_FOLDERS};
use crate::inventory::db;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Tolerated |observed - expected| before the purge is skipped as a broken
/// crawl. A gap below this still purges (with a warning), which means files
/// a partial crawl missed can be deleted; the gate bounds that blast radius
/// rather than eliminating it.
const GAP_TOLERANCE: i64 = 10;

/// Filenames recorded locally but absent remotely, if the gap gate passes.
///
/// # Arguments
///
/// * `local_db` - Path of `.localfiles.db`.
/// * `temp_db` - Path of `.tempfiles.db`.
/// * `expected` - Authoritative count from the scan list (`-1` when the
///   scan list could not be fetched, which always fails the gate).
///
/// # Returns
///
/// * `Ok(Vec<String>)` - The purge set; empty when the gate failed.
/// * `Err(anyhow::Error)` - Either database could not be read.
pub fn diff_databases(local_db: &Path, temp_db: &Path, expected: i64) -> Result<Vec<String>> {
    let local = db::filenames(&db::open(local_db)?)?;
    let remote = db::filenames(&db::open(temp_db)?)?;
    let observed = remote.len() as i64;
    let gap = (observed - expected).abs();
    if expected <= 0 || gap >= GAP_TOLERANCE {
        error!(
            "Total amount do not match: {} -> {}. Purges are skipped",
            expected, observed
        );
        return Ok(Vec::new());
    }
    if gap != 0 {
        warn!(
            "Total amount do not match: {} -> {}. But the gap {} is less than {}, purging anyway...",
            expected, observed, gap, GAP_TOLERANCE
        );
    }
    Ok(local.difference(&remote).cloned().collect())
}

/// Removes local files whose names are in the purge set.
///
/// Individual removal failures are logged and skipped; the next run will
/// see the file again and retry.
pub fn purge_removed_files(
    local_db: &Path,
    temp_db: &Path,
    media: &Path,
    expected: i64,
) -> Result<()> {
    for file in diff_databases(local_db, temp_db, expected)? {
        let target = media.join(file.trim_start_matches('/'));
        match fs::remove_file(&target) {
            Ok(()) => info!("Purged {}", file),
            Err(e) => error!("Unable to remove {} due to {}", file, e),
        }
    }
    Ok(())
}

/// Removes directories left empty under the selected paths, deepest first.
/// Excluded folders are neither entered nor removed, and the selected roots
/// themselves are kept.
pub fn sweep_empty_dirs(media: &Path, paths: &[String]) {
    for path in paths {
        let decoded = match config::decode_path(path) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Skipping sweep of {}: {:#}", path, e);
                continue;
            }
        };
        let root = media.join(&decoded);
        let walker = WalkDir::new(&root)
            .contents_first(true)
            .into_iter()
            .filter_entry(|entry| !is_excluded_dir(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Sweep error under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() || entry.path() == root {
                continue;
            }
            if !is_empty_dir(entry.path()) {
                continue;
            }
            match fs::remove_dir(entry.path()) {
                Ok(()) => info!("Removed empty directory {}", entry.path().display()),
                Err(e) => error!("Unable to remove {} due to {}", entry.path().display(), e),
            }
        }
    }
}

/// Drops the consumed local inventory and promotes the remote inventory for
/// the next run. `--all` runs pass `false` and leave no databases behind.
pub fn rotate_databases(local_db: &Path, temp_db: &Path, keep_temp_as_local: bool) -> Result<()> {
    fs::remove_file(local_db)
        .with_context(|| format!("remove {}", local_db.display()))?;
    if keep_temp_as_local {
        fs::rename(temp_db, local_db)
            .with_context(|| format!("rotate {} into place", temp_db.display()))?;
    } else {
        fs::remove_file(temp_db)
            .with_context(|| format!("remove {}", temp_db.display()))?;
    }
    Ok(())
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| EXCLUDED_FOLDERS.contains(&name))
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::encode_path;
    use std::path::PathBuf;

    fn seed_db(path: &Path, names: &[&str]) {
        let mut conn = db::open(path).unwrap();
        let rows: Vec<db::FileRow> = names
            .iter()
            .map(|n| (n.to_string(), None, None))
            .collect();
        db::insert_files(&mut conn, &rows).unwrap();
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn dbs(dir: &Path) -> (PathBuf, PathBuf) {
        (dir.join(".localfiles.db"), dir.join(".tempfiles.db"))
    }

    #[test]
    fn test_diff_exact_match_purges_difference() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/a", "/b", "/c"]);
        seed_db(&temp, &["/a", "/b"]);
        let diff = diff_databases(&local, &temp, 2).unwrap();
        assert_eq!(diff, vec!["/c".to_string()]);
    }

    #[test]
    fn test_diff_small_gap_still_purges() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/a", "/b", "/c"]);
        seed_db(&temp, &["/a"]);
        // observed 1, expected 5: gap 4 < 10
        let diff = diff_databases(&local, &temp, 5).unwrap();
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_diff_large_gap_skips_purge() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/a", "/b", "/c"]);
        seed_db(&temp, &["/a"]);
        assert!(diff_databases(&local, &temp, 11).unwrap().is_empty());
    }

    /// A failed scan-list fetch reports -1; nothing may be purged then.
    #[test]
    fn test_diff_unknown_expected_skips_purge() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/a"]);
        seed_db(&temp, &[]);
        assert!(diff_databases(&local, &temp, -1).unwrap().is_empty());
    }

    /// A remote surplus is as suspicious as a deficit.
    #[test]
    fn test_diff_surplus_gap_is_symmetric() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/a"]);
        let many: Vec<String> = (0..15).map(|i| format!("/r{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
        seed_db(&temp, &refs);
        assert!(diff_databases(&local, &temp, 3).unwrap().is_empty());
    }

    #[test]
    fn test_purge_removes_only_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        touch(&media.join("每日更新/a.mkv"));
        touch(&media.join("每日更新/b.mkv"));
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/每日更新/a.mkv", "/每日更新/b.mkv"]);
        seed_db(&temp, &["/每日更新/a.mkv"]);
        purge_removed_files(&local, &temp, &media, 1).unwrap();
        assert!(media.join("每日更新/a.mkv").exists());
        assert!(!media.join("每日更新/b.mkv").exists());
    }

    #[test]
    fn test_sweep_removes_nested_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        fs::create_dir_all(media.join("每日更新/show/season/empty")).unwrap();
        touch(&media.join("每日更新/kept/ep.mkv"));
        fs::create_dir_all(media.join("每日更新/.sync")).unwrap();
        sweep_empty_dirs(&media, &[encode_path("每日更新/")]);
        assert!(!media.join("每日更新/show").exists());
        assert!(media.join("每日更新/kept/ep.mkv").exists());
        assert!(media.join("每日更新/.sync").exists());
        assert!(media.join("每日更新").exists());
    }

    #[test]
    fn test_rotate_promotes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/old"]);
        seed_db(&temp, &["/new"]);
        rotate_databases(&local, &temp, true).unwrap();
        assert!(!temp.exists());
        let names = db::filenames(&db::open(&local).unwrap()).unwrap();
        assert!(names.contains("/new"));
        assert!(!names.contains("/old"));
    }

    #[test]
    fn test_rotate_all_run_deletes_both() {
        let dir = tempfile::tempdir().unwrap();
        let (local, temp) = dbs(dir.path());
        seed_db(&local, &["/old"]);
        seed_db(&temp, &["/new"]);
        rotate_databases(&local, &temp, false).unwrap();
        assert!(!local.exists());
        assert!(!temp.exists());
    }
}
