use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;

/// One `files` row: filename key, optional mtime, optional size. The local
/// builder leaves mtime and size null; only the crawler records them.
pub type FileRow = (String, Option<i64>, Option<i64>);

/// Table shape shared by the local and remote inventories. No primary key:
/// duplicate filenames are tolerated at insert time and collapse on SELECT.
const FILES_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS files (
    filename TEXT,
    timestamp INTEGER NULL,
    filesize INTEGER NULL
)";

/// Opens an inventory database, creating the file and table when missing.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open inventory {}", path.display()))?;
    conn.execute_batch(FILES_SCHEMA).context("create files table")?;
    Ok(conn)
}

/// Inserts a batch of rows inside one transaction.
pub fn insert_files(conn: &mut Connection, rows: &[FileRow]) -> Result<()> {
    let tx = conn.transaction().context("begin inventory transaction")?;
    {
        let mut stmt = tx
            .prepare("INSERT OR REPLACE INTO files VALUES (?1, ?2, ?3)")
            .context("prepare inventory insert")?;
        for (filename, timestamp, filesize) in rows {
            stmt.execute(params![filename, timestamp, filesize])
                .with_context(|| format!("insert {}", filename))?;
        }
    }
    tx.commit().context("commit inventory transaction")
}

/// The set of filenames currently recorded (duplicates collapsed).
pub fn filenames(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT filename FROM files")
        .context("prepare inventory select")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("select filenames")?;
    let mut names = HashSet::new();
    for name in rows {
        names.insert(name.context("read filename row")?);
    }
    Ok(names)
}

/// Raw row count, duplicates included. Compared against the expected count
/// to decide whether a stale local inventory needs re-seeding.
pub fn row_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .context("count inventory rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_select_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open(&dir.path().join("files.db")).unwrap();
        insert_files(
            &mut conn,
            &[
                ("/a/x.mkv".to_string(), Some(100), Some(5)),
                ("/a/y.mkv".to_string(), None, None),
            ],
        )
        .unwrap();
        let names = filenames(&conn).unwrap();
        assert!(names.contains("/a/x.mkv"));
        assert!(names.contains("/a/y.mkv"));
        assert_eq!(names.len(), 2);
    }

    /// Without a primary key, re-inserted filenames stay as extra rows but
    /// collapse in the comparison set.
    #[test]
    fn test_duplicates_collapse_on_select() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open(&dir.path().join("files.db")).unwrap();
        let row = ("/a/x.mkv".to_string(), Some(1), Some(1));
        insert_files(&mut conn, &[row.clone(), row]).unwrap();
        assert_eq!(row_count(&conn).unwrap(), 2);
        assert_eq!(filenames(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.db");
        {
            let mut conn = open(&path).unwrap();
            insert_files(&mut conn, &[("/a".to_string(), None, None)]).unwrap();
        }
        let conn = open(&path).unwrap();
        assert_eq!(row_count(&conn).unwrap(), 1);
    }
}
