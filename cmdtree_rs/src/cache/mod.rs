//! Persistent cache of named tables.
//!
//! A cache is a directory of table files guarded by an exclusive lock for as
//! long as the handle is open. Writes stay in memory until [`Cache::commit`]
//! or [`Cache::close`] with `commit = true`; dropping an open handle
//! abandons them. A cache created by this handle and never committed leaves
//! nothing behind.
//!
//! ```rust,no_run
//! use cmdtree::cache::{OpenOptions, TableOptions};
//! use cmdtree::cells;
//!
//! let cache = OpenOptions::new("/tmp/caches").version("1").open("demo").unwrap();
//! let table = cache.table("zones", TableOptions::new().columns(2).keys(1)).unwrap();
//! table.add_rows(&[cells!["zone-1", "region-1"]]).unwrap();
//! table.validate().unwrap();
//! cache.close(true).unwrap();
//! ```

pub mod cell;
mod error;
mod storage;
mod table;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub use cell::{Cell, Row, Template};
pub use error::CacheError;
pub use table::{Table, TableOptions};

use crate::clock::{Clock, SystemClock};
use crate::encoding::{encode_cache_name, encode_table_name};
use crate::fs_utils::FileLock;
use storage::{LOCK_FILE, METADATA_FILE, Metadata, Probe, TableMeta};

/// Table names the cache keeps for itself.
pub const RESERVED_TABLES: [&str; 2] = [METADATA_FILE, LOCK_FILE];

/// Builder for opening a cache under an explicit root directory.
#[derive(Clone)]
pub struct OpenOptions {
    root: PathBuf,
    version: String,
    create: bool,
    clock: Rc<dyn Clock>,
}

impl OpenOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            version: String::from("1"),
            create: true,
            clock: Rc::new(SystemClock),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn open(&self, name: &str) -> Result<Cache, CacheError> {
        let dir = self.root.join(encode_cache_name(name)?);
        let shown = dir.display().to_string();

        let (lock, existing) = match storage::probe(&dir) {
            Probe::Foreign => return Err(CacheError::Invalid { name: shown }),
            Probe::Missing if !self.create => return Err(CacheError::NotFound { name: shown }),
            Probe::Missing => {
                fs::create_dir_all(&dir).map_err(|e| CacheError::io(&shown, e))?;
                let lock = storage::lock(&dir).map_err(|e| CacheError::io(&shown, e))?;
                // Another process may have committed while we waited.
                let existing = matches!(storage::probe(&dir), Probe::Present);
                (lock, existing)
            }
            Probe::Present => {
                let lock = storage::lock(&dir).map_err(|e| CacheError::io(&shown, e))?;
                (lock, true)
            }
        };

        let mut state = CacheState {
            name: shown.clone(),
            dir,
            version: self.version.clone(),
            clock: Rc::clone(&self.clock),
            tables: Vec::new(),
            removed: Vec::new(),
            fresh: !existing,
            lock: Some(lock),
            closed: false,
        };

        if existing {
            let metadata = storage::read_metadata(&state.dir).map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::NotFound => CacheError::Invalid {
                    name: shown.clone(),
                },
                _ => CacheError::io(&shown, e),
            })?;
            if metadata.version != self.version {
                state.closed = true;
                return Err(CacheError::VersionMismatch {
                    name: shown,
                    found: metadata.version,
                    requested: self.version.clone(),
                });
            }
            for meta in metadata.tables {
                let file = encode_table_name(&meta.name)?;
                state.tables.push(TableState {
                    meta,
                    file,
                    rows: None,
                    rows_dirty: false,
                });
            }
        }

        tracing::debug!(cache = %state.name, fresh = state.fresh, tables = state.tables.len(), "opened cache");
        Ok(Cache {
            state: Rc::new(RefCell::new(state)),
        })
    }
}

/// Handle to an open cache. Clones share the same state.
#[derive(Clone)]
pub struct Cache {
    state: Rc<RefCell<CacheState>>,
}

impl Cache {
    /// Opens `name` under the default cache root.
    pub fn open(name: &str, version: &str, create: bool) -> Result<Cache, CacheError> {
        OpenOptions::new(crate::config::default_cache_root())
            .version(version)
            .create(create)
            .open(name)
    }

    /// Removes a cache without opening it.
    pub fn delete_in(root: &Path, name: &str) -> Result<(), CacheError> {
        let dir = root.join(encode_cache_name(name)?);
        let shown = dir.display().to_string();
        match storage::probe(&dir) {
            Probe::Missing => Err(CacheError::NotFound { name: shown }),
            Probe::Foreign => Err(CacheError::Invalid { name: shown }),
            Probe::Present => {
                let lock = storage::lock(&dir).map_err(|e| CacheError::io(&shown, e))?;
                drop(lock);
                storage::remove_dir_if_exists(&dir).map_err(|e| CacheError::io(&shown, e))?;
                tracing::info!(cache = %shown, "deleted cache");
                Ok(())
            }
        }
    }

    /// Display name: the cache's directory.
    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn path(&self) -> PathBuf {
        self.state.borrow().dir.clone()
    }

    pub fn version(&self) -> String {
        self.state.borrow().version.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Persists pending writes and keeps the cache open.
    pub fn commit(&self) -> Result<(), CacheError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.commit()
    }

    /// Commits or abandons pending writes and releases the lock. Closing a
    /// closed cache is a no-op.
    pub fn close(&self, commit: bool) -> Result<(), CacheError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Ok(());
        }
        let result = if commit { state.commit() } else { Ok(()) };
        state.release(commit && result.is_ok());
        result
    }

    /// Removes the cache and all of its tables. Idempotent.
    pub fn delete(&self) -> Result<(), CacheError> {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.fresh = false;
        state.tables.clear();
        state.lock = None;
        let name = state.name.clone();
        storage::remove_dir_if_exists(&state.dir).map_err(|e| CacheError::io(&name, e))
    }

    /// Marks every table invalid so the next select reports it expired.
    pub fn invalidate(&self) -> Result<(), CacheError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        for table in &mut state.tables {
            table.meta.valid = false;
            table.meta.modified = 0;
        }
        Ok(())
    }

    /// Names of unrestricted tables, optionally filtered by a glob, in
    /// creation order.
    pub fn select(&self, pattern: Option<&str>) -> Result<Vec<String>, CacheError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        let glob = pattern.and_then(cell::compile_glob);
        Ok(state
            .tables
            .iter()
            .filter(|t| !t.meta.restricted)
            .filter(|t| glob.as_ref().is_none_or(|g| g.is_match(&t.meta.name)))
            .map(|t| t.meta.name.clone())
            .collect())
    }

    /// Opens or creates a table.
    ///
    /// Reopening adopts the stored schema; explicitly supplied columns or
    /// keys must match it. A new table is invalid until
    /// [`Table::validate`].
    pub fn table(&self, name: &str, options: TableOptions) -> Result<Table, CacheError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        let cache_name = state.name.clone();

        if RESERVED_TABLES.contains(&name) {
            return Err(CacheError::TableRestricted {
                name: cache_name,
                table: name.to_string(),
            });
        }

        if let Some(idx) = state.find(name) {
            let table = &mut state.tables[idx];
            if table.meta.restricted && !options.restricted {
                return Err(CacheError::TableRestricted {
                    name: cache_name,
                    table: name.to_string(),
                });
            }
            if let Some(columns) = options.columns.filter(|c| *c != table.meta.columns) {
                return Err(CacheError::TableColumnsInvalid {
                    name: cache_name,
                    table: name.to_string(),
                    message: format!(
                        "cache table [{name}] columns [{columns}] does not match existing {}.",
                        table.meta.columns
                    ),
                });
            }
            if let Some(keys) = options.keys.filter(|k| *k != table.meta.keys) {
                return Err(CacheError::TableKeysInvalid {
                    name: cache_name,
                    table: name.to_string(),
                    message: format!(
                        "cache table [{name}] keys [{keys}] does not match existing {}.",
                        table.meta.keys
                    ),
                });
            }
            if let Some(timeout) = options.timeout {
                table.meta.timeout = timeout;
            }
        } else {
            if !options.create {
                return Err(CacheError::TableNotFound {
                    name: cache_name,
                    table: name.to_string(),
                });
            }
            let columns = options.columns.unwrap_or(1);
            let keys = options.keys.unwrap_or(1);
            if columns < 1 {
                return Err(CacheError::TableColumnsInvalid {
                    name: cache_name,
                    table: name.to_string(),
                    message: format!("table [{name}] column count [{columns}] must be >= 1."),
                });
            }
            if keys < 1 || keys > columns {
                return Err(CacheError::TableKeysInvalid {
                    name: cache_name,
                    table: name.to_string(),
                    message: format!(
                        "table [{name}] primary key count [{keys}] must be >= 1 and <= {columns}."
                    ),
                });
            }
            let file = encode_table_name(name)?;
            tracing::debug!(cache = %cache_name, table = name, columns, keys, "created table");
            state.tables.push(TableState {
                meta: TableMeta {
                    name: name.to_string(),
                    columns,
                    keys,
                    timeout: options.timeout.unwrap_or(0),
                    modified: 0,
                    restricted: options.restricted,
                    valid: false,
                },
                file,
                rows: Some(BTreeMap::new()),
                rows_dirty: true,
            });
        }

        Ok(Table::new(Rc::clone(&self.state), name))
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Cache")
            .field("name", &state.name)
            .field("version", &state.version)
            .field("tables", &state.tables.len())
            .field("closed", &state.closed)
            .finish()
    }
}

pub(crate) type RowMap = BTreeMap<Row, Row>;

pub(crate) struct TableState {
    pub meta: TableMeta,
    pub file: String,
    /// Loaded on first access.
    pub rows: Option<RowMap>,
    pub rows_dirty: bool,
}

pub(crate) struct CacheState {
    pub name: String,
    pub dir: PathBuf,
    pub version: String,
    pub clock: Rc<dyn Clock>,
    pub tables: Vec<TableState>,
    /// Row files of deleted tables, removed at commit.
    pub removed: Vec<String>,
    /// No committed metadata exists on disk yet.
    pub fresh: bool,
    lock: Option<FileLock>,
    pub closed: bool,
}

impl CacheState {
    pub fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed {
            return Err(CacheError::Closed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn find(&self, table: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.meta.name == table)
    }

    pub fn rows_mut(&mut self, idx: usize) -> Result<&mut RowMap, CacheError> {
        if self.tables[idx].rows.is_none() {
            let path = storage::rows_path(&self.dir, &self.tables[idx].file);
            let loaded = storage::read_rows(&path).map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData => CacheError::Invalid {
                    name: self.name.clone(),
                },
                _ => CacheError::io(&self.name, e),
            })?;
            let keys = self.tables[idx].meta.keys;
            let map = loaded
                .into_iter()
                .map(|row| (row[..keys.min(row.len())].to_vec(), row))
                .collect();
            self.tables[idx].rows = Some(map);
        }
        match self.tables[idx].rows.as_mut() {
            Some(rows) => Ok(rows),
            None => Err(CacheError::Invalid {
                name: self.name.clone(),
            }),
        }
    }

    fn commit(&mut self) -> Result<(), CacheError> {
        let name = self.name.clone();
        let io_err = |e| CacheError::io(&name, e);

        for file in std::mem::take(&mut self.removed) {
            if !self.tables.iter().any(|t| t.file == file) {
                storage::remove_file_if_exists(&storage::rows_path(&self.dir, &file))
                    .map_err(io_err)?;
            }
        }

        for table in self.tables.iter_mut().filter(|t| t.rows_dirty) {
            if let Some(rows) = &table.rows {
                storage::write_rows(&storage::rows_path(&self.dir, &table.file), rows.values())
                    .map_err(io_err)?;
            }
            table.rows_dirty = false;
        }

        let metadata = Metadata {
            version: self.version.clone(),
            tables: self.tables.iter().map(|t| t.meta.clone()).collect(),
        };
        storage::write_metadata(&self.dir, &metadata).map_err(io_err)?;
        self.fresh = false;
        tracing::debug!(cache = %self.name, tables = self.tables.len(), "committed cache");
        Ok(())
    }

    /// Drops the lock; an uncommitted fresh cache is removed from disk.
    fn release(&mut self, committed: bool) {
        self.lock = None;
        self.closed = true;
        self.tables.clear();
        self.removed.clear();
        if self.fresh && !committed {
            if let Err(e) = storage::remove_dir_if_exists(&self.dir) {
                tracing::warn!(cache = %self.name, error = %e, "failed to remove abandoned cache");
            }
        }
    }
}

impl Drop for CacheState {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!(cache = %self.name, "abandoning unclosed cache");
            self.release(false);
        }
    }
}
