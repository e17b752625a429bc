use std::cell::RefCell;
use std::rc::Rc;

use super::cell::{Row, Template};
use super::{CacheError, CacheState};

/// Options for [`Cache::table`](super::Cache::table).
///
/// `columns` and `keys` default to 1 for new tables and to the stored schema
/// for existing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub columns: Option<usize>,
    pub keys: Option<usize>,
    /// Seconds after validation before rows expire; 0 means never.
    pub timeout: Option<u64>,
    pub restricted: bool,
    pub create: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            columns: None,
            keys: None,
            timeout: None,
            restricted: false,
            create: true,
        }
    }
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn keys(mut self, keys: usize) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }
}

/// Handle to one table of an open cache.
///
/// Rows are keyed by their first `keys` cells; adding a row with an existing
/// key replaces it. Selects return rows in key order.
#[derive(Clone)]
pub struct Table {
    state: Rc<RefCell<CacheState>>,
    name: String,
}

impl Table {
    pub(super) fn new(state: Rc<RefCell<CacheState>>, name: &str) -> Self {
        Self {
            state,
            name: name.to_string(),
        }
    }

    fn with<R>(
        &self,
        f: impl FnOnce(&mut CacheState, usize) -> Result<R, CacheError>,
    ) -> Result<R, CacheError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        let idx = state.find(&self.name).ok_or_else(|| CacheError::TableNotFound {
            name: state.name.clone(),
            table: self.name.clone(),
        })?;
        f(&mut *state, idx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> Result<usize, CacheError> {
        self.with(|state, idx| Ok(state.tables[idx].meta.columns))
    }

    pub fn keys(&self) -> Result<usize, CacheError> {
        self.with(|state, idx| Ok(state.tables[idx].meta.keys))
    }

    pub fn timeout(&self) -> Result<u64, CacheError> {
        self.with(|state, idx| Ok(state.tables[idx].meta.timeout))
    }

    /// Seconds since the epoch of the last validation; 0 when invalidated.
    pub fn modified(&self) -> Result<i64, CacheError> {
        self.with(|state, idx| Ok(state.tables[idx].meta.modified))
    }

    pub fn restricted(&self) -> Result<bool, CacheError> {
        self.with(|state, idx| Ok(state.tables[idx].meta.restricted))
    }

    pub fn is_valid(&self) -> Result<bool, CacheError> {
        self.with(|state, idx| Ok(state.tables[idx].meta.valid))
    }

    /// Expired when invalid, or when a timeout is set and has elapsed since
    /// validation.
    pub fn is_expired(&self) -> Result<bool, CacheError> {
        self.with(|state, idx| Ok(expired(state, idx)))
    }

    /// Upserts rows. Every row must have exactly `columns` cells; nothing is
    /// written when one of them does not.
    pub fn add_rows(&self, rows: &[Row]) -> Result<(), CacheError> {
        self.with(|state, idx| {
            let meta = &state.tables[idx].meta;
            let (columns, keys) = (meta.columns, meta.keys);
            if let Some(bad) = rows.iter().find(|row| row.len() != columns) {
                return Err(CacheError::row_size(&self.name, bad.len(), columns, true));
            }
            let map = state.rows_mut(idx)?;
            for row in rows {
                map.insert(row[..keys].to_vec(), row.clone());
            }
            state.tables[idx].rows_dirty = true;
            Ok(())
        })
    }

    /// Deletes rows matching any template, or every row when `templates`
    /// is `None`. Templates may be shorter than a row; `Null` cells match
    /// anything.
    pub fn delete_rows(&self, templates: Option<&[Row]>) -> Result<(), CacheError> {
        self.with(|state, idx| {
            let columns = state.tables[idx].meta.columns;
            let compiled = match templates {
                None => None,
                Some(templates) => {
                    check_template_sizes(&self.name, templates.iter().map(Vec::len), columns)?;
                    Some(templates.iter().map(|t| Template::new(t)).collect::<Vec<_>>())
                }
            };
            let map = state.rows_mut(idx)?;
            match compiled {
                None => map.clear(),
                Some(compiled) => map.retain(|_, row| !compiled.iter().any(|t| t.matches(row))),
            }
            state.tables[idx].rows_dirty = true;
            Ok(())
        })
    }

    /// Rows matching `template` (all rows for `None`). Fails with
    /// [`CacheError::TableExpired`] when the table needs refreshing.
    pub fn select(&self, template: Option<&[super::Cell]>) -> Result<Vec<Row>, CacheError> {
        self.with(|state, idx| {
            if expired(state, idx) {
                return Err(CacheError::TableExpired {
                    name: state.name.clone(),
                    table: self.name.clone(),
                });
            }
            let columns = state.tables[idx].meta.columns;
            let compiled = match template {
                None => None,
                Some(cells) => {
                    check_template_sizes(&self.name, std::iter::once(cells.len()), columns)?;
                    Some(Template::new(cells))
                }
            };
            let map = state.rows_mut(idx)?;
            Ok(map
                .values()
                .filter(|row| compiled.as_ref().is_none_or(|t| t.matches(row)))
                .cloned()
                .collect())
        })
    }

    /// Marks the table fresh as of now.
    pub fn validate(&self) -> Result<(), CacheError> {
        self.with(|state, idx| {
            let now = state.clock.now();
            let meta = &mut state.tables[idx].meta;
            meta.valid = true;
            meta.modified = now;
            Ok(())
        })
    }

    pub fn invalidate(&self) -> Result<(), CacheError> {
        self.with(|state, idx| {
            let meta = &mut state.tables[idx].meta;
            meta.valid = false;
            meta.modified = 0;
            Ok(())
        })
    }

    /// Removes the table; its file goes away at the next commit.
    pub fn delete(&self) -> Result<(), CacheError> {
        self.with(|state, idx| {
            let removed = state.tables.remove(idx);
            tracing::debug!(cache = %state.name, table = %self.name, "deleted table");
            state.removed.push(removed.file);
            Ok(())
        })
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("name", &self.name).finish()
    }
}

fn expired(state: &CacheState, idx: usize) -> bool {
    let meta = &state.tables[idx].meta;
    if !meta.valid {
        return true;
    }
    meta.timeout > 0 && state.clock.now() - meta.modified >= meta.timeout as i64
}

fn check_template_sizes(
    table: &str,
    sizes: impl IntoIterator<Item = usize>,
    columns: usize,
) -> Result<(), CacheError> {
    for size in sizes {
        if size < 1 || size > columns {
            return Err(CacheError::row_size(table, size, columns, false));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{Cache, OpenOptions};
    use super::*;
    use crate::cells;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    fn open(tmp: &TempDir, clock: Rc<ManualClock>) -> Cache {
        OpenOptions::new(tmp.path())
            .version("1")
            .clock(clock)
            .open("test.cache")
            .unwrap()
    }

    #[test]
    fn test_upsert_replaces_row_with_same_key() {
        let tmp = TempDir::new().expect("create temp dir");
        let cache = open(&tmp, Rc::new(ManualClock::new(0)));
        let t = cache
            .table("t", TableOptions::new().columns(2).keys(1))
            .unwrap();
        t.add_rows(&[cells!["a", "1"], cells!["b", "2"]]).unwrap();
        t.add_rows(&[cells!["a", "3"]]).unwrap();
        t.validate().unwrap();
        assert_eq!(
            t.select(None).unwrap(),
            vec![cells!["a", "3"], cells!["b", "2"]]
        );
        cache.close(false).unwrap();
    }

    #[test]
    fn test_row_size_messages() {
        let tmp = TempDir::new().expect("create temp dir");
        let cache = open(&tmp, Rc::new(ManualClock::new(0)));
        let one = cache.table("one", TableOptions::new()).unwrap();
        let err = one.add_rows(&[cells!["a", "b"]]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cache table [one] row size [2] is invalid. Must be 1."
        );

        let three = cache
            .table("three", TableOptions::new().columns(3))
            .unwrap();
        three.validate().unwrap();
        let err = three.select(Some(&cells!["a", "b", "c", "d"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cache table [three] row size [4] is invalid. Must be >= 1 and <= 3."
        );
        let err = three.delete_rows(Some(&[vec![]])).unwrap_err();
        assert!(matches!(
            err,
            CacheError::TableRowSizeInvalid { size: 0, .. }
        ));
        cache.close(false).unwrap();
    }

    #[test]
    fn test_delete_rows_with_wildcards() {
        let tmp = TempDir::new().expect("create temp dir");
        let cache = open(&tmp, Rc::new(ManualClock::new(0)));
        let t = cache
            .table("t", TableOptions::new().columns(3).keys(3))
            .unwrap();
        t.add_rows(&[
            cells!["x", "a", "1"],
            cells!["y", "a", "2"],
            cells!["z", "b", "3"],
        ])
        .unwrap();
        t.delete_rows(Some(&[cells![None::<&str>, "a", None::<&str>]]))
            .unwrap();
        t.validate().unwrap();
        assert_eq!(t.select(None).unwrap(), vec![cells!["z", "b", "3"]]);

        t.delete_rows(None).unwrap();
        assert!(t.select(None).unwrap().is_empty());
        cache.close(false).unwrap();
    }

    #[test]
    fn test_expiry_follows_timeout() {
        let tmp = TempDir::new().expect("create temp dir");
        let clock = Rc::new(ManualClock::new(100));
        let cache = open(&tmp, clock.clone());
        let t = cache.table("t", TableOptions::new().timeout(10)).unwrap();
        assert!(t.is_expired().unwrap());
        t.validate().unwrap();
        assert_eq!(t.modified().unwrap(), 100);
        clock.advance(9);
        assert!(!t.is_expired().unwrap());
        clock.advance(1);
        assert!(t.select(None).unwrap_err().is_expired());

        t.validate().unwrap();
        t.invalidate().unwrap();
        assert_eq!(t.modified().unwrap(), 0);
        assert!(t.is_expired().unwrap());
        cache.close(false).unwrap();
    }

    #[test]
    fn test_select_glob_template() {
        let tmp = TempDir::new().expect("create temp dir");
        let cache = open(&tmp, Rc::new(ManualClock::new(0)));
        let t = cache.table("t", TableOptions::new()).unwrap();
        t.add_rows(&[cells!["one"], cells!["two"], cells!["three"]])
            .unwrap();
        t.validate().unwrap();
        assert_eq!(
            t.select(Some(&cells!["*w*"])).unwrap(),
            vec![cells!["two"]]
        );
        assert_eq!(
            t.select(Some(&cells!["t*"])).unwrap(),
            vec![cells!["three"], cells!["two"]]
        );
        cache.close(false).unwrap();
    }
}
