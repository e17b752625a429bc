//! Cache cells and template matching.

use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

/// One column value. `Null` in a template matches anything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Text(String),
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&String> for Cell {
    fn from(value: &String) -> Self {
        Cell::Text(value.clone())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// Builds a [`Row`] from heterogeneous values: `cells!["a", 1i64, None::<&str>]`.
#[macro_export]
macro_rules! cells {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::cache::Cell::from($value)),*]
    };
}

pub fn has_glob_meta(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

/// Compiles a glob over the whole string; `/` is an ordinary character.
pub fn compile_glob(pattern: &str) -> Option<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .ok()
}

#[derive(Debug, Clone)]
enum CellMatcher {
    Any,
    Exact(Cell),
    Glob(GlobMatcher),
}

impl CellMatcher {
    fn new(template: &Cell) -> Self {
        match template {
            Cell::Null => CellMatcher::Any,
            Cell::Text(pattern) if has_glob_meta(pattern) => match compile_glob(pattern) {
                Some(glob) => CellMatcher::Glob(glob),
                None => CellMatcher::Exact(template.clone()),
            },
            other => CellMatcher::Exact(other.clone()),
        }
    }

    fn matches(&self, cell: &Cell) -> bool {
        match self {
            CellMatcher::Any => true,
            CellMatcher::Exact(expected) => expected == cell,
            CellMatcher::Glob(glob) => match cell {
                Cell::Text(text) => glob.is_match(text),
                Cell::Int(n) => glob.is_match(n.to_string()),
                Cell::Null => false,
            },
        }
    }
}

/// Compiled row template. Missing trailing columns behave like `Null`.
#[derive(Debug, Clone)]
pub struct Template {
    matchers: Vec<CellMatcher>,
}

impl Template {
    pub fn new(cells: &[Cell]) -> Self {
        Self {
            matchers: cells.iter().map(CellMatcher::new).collect(),
        }
    }

    pub fn matches(&self, row: &[Cell]) -> bool {
        self.matchers
            .iter()
            .zip(row.iter())
            .all(|(matcher, cell)| matcher.matches(cell))
    }
}
