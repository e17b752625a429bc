//! Completer backed by a list command and a cache table.
//!
//! The list command is run with `--uri --quiet`; every self link it prints
//! becomes one row, with columns taken from URI collection segments
//! (`.../zones/zone-1/instances/vm-1` gives `name = vm-1, zone = zone-1`).
//! Rows are cached in a table named after the collection plus every scope
//! value fixed on the command line (`compute.instances.zone-1`).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::candidate::Candidate;
use super::completer::{Completer, CompletionRequest};
use crate::cache::{Cell, Row, Table, TableOptions, Template};
use crate::encoding::decode;

pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Rows written between cancellation checks.
const ROW_BATCH: usize = 64;

/// A cached attribute of the listed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// URI collection segment holding the value (`zones`, `instances`).
    pub segment: String,
    /// Flag that scopes the listing to one value of this column.
    pub flag: Option<String>,
}

impl Column {
    pub fn new(name: &str, segment: &str) -> Self {
        Self {
            name: name.to_string(),
            segment: segment.to_string(),
            flag: None,
        }
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.flag = Some(flag.to_string());
        self
    }
}

fn dest(flag: &str) -> String {
    flag.replace('-', "_")
}

#[derive(Debug, Clone)]
pub struct ListCommandCompleter {
    collection: String,
    list_command: Vec<String>,
    /// First column is the completed value.
    columns: Vec<Column>,
    /// Flags forwarded to the list command and folded into the table name
    /// without being cached as columns (`--project`).
    scopes: Vec<String>,
    timeout: u64,
}

impl ListCommandCompleter {
    pub fn new(collection: &str, list_command: &[&str], primary: Column) -> Self {
        Self {
            collection: collection.to_string(),
            list_command: list_command.iter().map(|s| s.to_string()).collect(),
            columns: vec![primary],
            scopes: Vec::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn scope(mut self, flag: &str) -> Self {
        self.scopes.push(flag.to_string());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Column values fixed by the namespace, index-aligned with columns.
    fn scoped_columns(&self, request: &CompletionRequest<'_>) -> Vec<Option<String>> {
        self.columns
            .iter()
            .map(|column| {
                let flag = column.flag.as_deref()?;
                scope_value(request, flag)
            })
            .collect()
    }

    /// `--flag=value` pairs for every fixed scope, columns first.
    fn scope_flags(
        &self,
        request: &CompletionRequest<'_>,
        scoped: &[Option<String>],
    ) -> Vec<(String, String)> {
        let columns = self
            .columns
            .iter()
            .zip(scoped)
            .filter_map(|(column, value)| Some((column.flag.clone()?, value.clone()?)));
        let extra = self
            .scopes
            .iter()
            .filter_map(|flag| Some((flag.clone(), scope_value(request, flag)?)));
        columns.chain(extra).collect()
    }

    pub fn table_name(&self, scope_flags: &[(String, String)]) -> String {
        let mut name = self.collection.clone();
        for (_, value) in scope_flags {
            name.push('.');
            name.push_str(value);
        }
        name
    }

    pub fn update_command(&self, scope_flags: &[(String, String)]) -> Vec<String> {
        let mut argv = self.list_command.clone();
        argv.push("--uri".to_string());
        argv.push("--quiet".to_string());
        argv.extend(
            scope_flags
                .iter()
                .map(|(flag, value)| format!("--{flag}={value}")),
        );
        argv
    }

    fn template(&self, prefix: &str, scoped: &[Option<String>]) -> Row {
        let primary = if prefix.is_empty() {
            Cell::Null
        } else {
            Cell::Text(format!("{prefix}*"))
        };
        std::iter::once(primary)
            .chain(scoped.iter().skip(1).map(|v| Cell::from(v.clone())))
            .collect()
    }

    /// Parses one self link into a row; `None` when the primary segment is
    /// missing.
    pub fn parse_uri(&self, line: &str) -> Option<Row> {
        let path = match line.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, path)| path)?,
            None => line,
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut values: HashMap<&str, &str> = HashMap::new();
        for pair in segments.windows(2) {
            values.insert(pair[0], pair[1]);
        }
        let cell = |column: &Column| -> Cell {
            match values.get(column.segment.as_str()) {
                Some(raw) => Cell::Text(decode(raw).unwrap_or_else(|_| raw.to_string())),
                None => Cell::Null,
            }
        };
        let row: Row = self.columns.iter().map(cell).collect();
        if row[0].is_null() { None } else { Some(row) }
    }

    fn run_update(
        &self,
        request: &CompletionRequest<'_>,
        scope_flags: &[(String, String)],
    ) -> crate::Result<Vec<Row>> {
        let argv = self.update_command(scope_flags);
        request.cancel.check()?;
        tracing::debug!(command = %argv.join(" "), "running completer update");
        let output = request.runner.run_capture(&argv)?;
        let text = String::from_utf8_lossy(&output);
        let mut rows = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.parse_uri(line) {
                Some(row) => rows.push(row),
                None => tracing::debug!(line, "skipping unparsable list output"),
            }
        }
        Ok(rows)
    }

    fn refresh(
        &self,
        table: &Table,
        rows: &[Row],
        request: &CompletionRequest<'_>,
    ) -> crate::Result<()> {
        table.delete_rows(None)?;
        for batch in rows.chunks(ROW_BATCH) {
            request.cancel.check()?;
            table.add_rows(batch)?;
        }
        table.validate()?;
        tracing::debug!(table = table.name(), rows = rows.len(), "completer table updated");
        Ok(())
    }

    fn rows(
        &self,
        request: &CompletionRequest<'_>,
        template: &[Cell],
        scope_flags: &[(String, String)],
    ) -> crate::Result<Vec<Row>> {
        let Some(cache) = request.cache else {
            let matcher = Template::new(template);
            let mut rows = self.run_update(request, scope_flags)?;
            rows.retain(|row| matcher.matches(row));
            return Ok(rows);
        };

        let width = self.columns.len();
        let table = cache.table(
            &self.table_name(scope_flags),
            TableOptions::new()
                .columns(width)
                .keys(width)
                .timeout(self.timeout),
        )?;
        match table.select(Some(template)) {
            Ok(rows) => Ok(rows),
            Err(e) if e.is_expired() => {
                let fresh = self.run_update(request, scope_flags)?;
                self.refresh(&table, &fresh, request)?;
                Ok(table.select(Some(template))?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn render(
        &self,
        rows: &[Row],
        scoped: &[Option<String>],
        request: &CompletionRequest<'_>,
    ) -> Vec<Candidate> {
        // Distinct values of every column per primary value.
        let mut variants: BTreeMap<(String, usize), BTreeSet<&Cell>> = BTreeMap::new();
        for row in rows {
            for (idx, cell) in row.iter().enumerate().skip(1) {
                variants
                    .entry((row[0].to_string(), idx))
                    .or_default()
                    .insert(cell);
            }
        }

        let requested = |idx: usize| -> bool {
            self.columns[idx]
                .flag
                .as_deref()
                .is_some_and(|flag| request.qualify.iter().any(|q| q == flag))
        };
        // A scope already fixed on the command line is never repeated.
        let qualified = |row: &Row, idx: usize| -> bool {
            if self.columns[idx].flag.is_none() || scoped[idx].is_some() {
                return false;
            }
            requested(idx)
                || variants
                    .get(&(row[0].to_string(), idx))
                    .is_some_and(|values| values.len() >= 2)
        };

        rows.iter()
            .map(|row| {
                let primary = row[0].to_string();
                if request.gri {
                    let mut fields = vec![primary];
                    for (idx, cell) in row.iter().enumerate().skip(1) {
                        let shown = scoped[idx].is_none() || requested(idx);
                        fields.push(if shown { cell.to_string() } else { String::new() });
                    }
                    if fields[1..].iter().all(String::is_empty) {
                        fields.truncate(1);
                    }
                    return Candidate::new(fields.join(":"));
                }
                let mut cell = primary;
                for (idx, value) in row.iter().enumerate().skip(1) {
                    if qualified(row, idx) && !value.is_null() {
                        if let Some(flag) = &self.columns[idx].flag {
                            cell.push_str(&format!(" --{flag}={value}"));
                        }
                    }
                }
                Candidate::new(cell)
            })
            .collect()
    }
}

fn scope_value(request: &CompletionRequest<'_>, flag: &str) -> Option<String> {
    let dest = dest(flag);
    if !request.namespace.is_specified(&dest) {
        return None;
    }
    request
        .namespace
        .get(&dest)
        .map(|v| v.to_plain())
        .filter(|v| !v.is_empty())
}

impl Completer for ListCommandCompleter {
    fn complete(&self, request: &CompletionRequest<'_>) -> crate::Result<Vec<Candidate>> {
        let scoped = self.scoped_columns(request);
        let scope_flags = self.scope_flags(request, &scoped);
        let template = self.template(request.prefix, &scoped);
        let rows = self.rows(request, &template, &scope_flags)?;
        Ok(self.render(&rows, &scoped, request))
    }

    fn describe(&self) -> String {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        format!(
            "{} [{}] columns={} timeout={}s",
            self.collection,
            self.update_command(&[]).join(" "),
            columns.join(","),
            self.timeout
        )
    }
}
