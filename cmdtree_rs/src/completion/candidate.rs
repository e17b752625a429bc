use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// One completion offer: `display` is shown in the menu, `cell` is what
/// the shell inserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Candidate {
    pub display: String,
    pub cell: String,
}

impl Candidate {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            display: value.clone(),
            cell: value,
        }
    }

    pub fn with_display(cell: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            cell: cell.into(),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cell)
    }
}

/// Stable candidate order: cells that literally start with `prefix` first,
/// then everything else (glob matches), each half sorted; duplicates of an
/// earlier cell are dropped.
pub fn order(candidates: Vec<Candidate>, prefix: &str) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.cell.clone()))
        .collect();
    unique.sort_by(|a, b| {
        let rank = |c: &Candidate| !c.cell.starts_with(prefix);
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.cell.cmp(&b.cell))
    });
    unique
}

/// Keeps candidates whose cell starts with `prefix`.
pub fn filter_prefix<'a, I>(values: I, prefix: &str) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .filter(|v| v.starts_with(prefix))
        .map(Candidate::new)
        .collect()
}
