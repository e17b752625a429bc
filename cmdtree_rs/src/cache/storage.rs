//! On-disk layout of a persistent cache.
//!
//! ```text
//! <root>/<encoded cache name>/
//!   __metadata__     JSON: version + table metadata
//!   __lock__         exclusive lock held while the cache is open
//!   <encoded table>  JSON array of rows, one file per table
//! ```
//!
//! Every file is replaced by write-to-temp + rename, so readers see either
//! the old or the new content.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::cell::Row;
pub(crate) use crate::fs_utils::{remove_dir_if_exists, remove_file_if_exists, write_atomic};
use crate::fs_utils::FileLock;

pub(crate) const METADATA_FILE: &str = "__metadata__";
pub(crate) const LOCK_FILE: &str = "__lock__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TableMeta {
    pub name: String,
    pub columns: usize,
    pub keys: usize,
    pub timeout: u64,
    pub modified: i64,
    #[serde(default)]
    pub restricted: bool,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Metadata {
    pub version: String,
    #[serde(default)]
    pub tables: Vec<TableMeta>,
}

pub(crate) enum Probe {
    Missing,
    Present,
    /// Something exists at the path but it is not a cache.
    Foreign,
}

pub(crate) fn probe(dir: &Path) -> Probe {
    if !dir.exists() {
        return Probe::Missing;
    }
    if dir.is_dir() && dir.join(METADATA_FILE).is_file() {
        Probe::Present
    } else {
        Probe::Foreign
    }
}

/// Exclusive lock on `<dir>/__lock__` held while the cache is open.
pub(crate) fn lock(dir: &Path) -> io::Result<FileLock> {
    FileLock::acquire(&dir.join(LOCK_FILE))
}

fn corrupt(path: &Path, err: serde_json::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{}: {err}", path.display()),
    )
}

pub(crate) fn read_metadata(dir: &Path) -> io::Result<Metadata> {
    let path = dir.join(METADATA_FILE);
    let content = fs::read(&path)?;
    serde_json::from_slice(&content).map_err(|e| corrupt(&path, e))
}

pub(crate) fn write_metadata(dir: &Path, metadata: &Metadata) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(metadata).map_err(io::Error::other)?;
    write_atomic(&dir.join(METADATA_FILE), &bytes)
}

pub(crate) fn rows_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(file)
}

/// Rows of a table; a missing file means the table has no rows yet.
pub(crate) fn read_rows(path: &Path) -> io::Result<Vec<Row>> {
    match fs::read(path) {
        Ok(content) => serde_json::from_slice(&content).map_err(|e| corrupt(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

pub(crate) fn write_rows<'a, I>(path: &Path, rows: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a Row>,
{
    let rows: Vec<&Row> = rows.into_iter().collect();
    let bytes = serde_json::to_vec(&rows).map_err(io::Error::other)?;
    write_atomic(path, &bytes)
}
