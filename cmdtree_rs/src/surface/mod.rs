//! Built-in command surface of the `cmdt` binary.
//!
//! `compute` exercises the dispatcher against a [`ResourceService`]; `meta`
//! inspects the machinery itself (resource cache, completers, completion
//! tree).

mod compute;
mod meta;

use std::rc::Rc;

use crate::completion::{
    Column, CompleterRegistry, FileCompleter, ListCommandCompleter, StaticCompleter,
};
use crate::config::Settings;
use crate::driver::Context;
use crate::error::Result;
use crate::service::{FixtureService, ResourceService};
use crate::tree::{ArgSpec, CommandTree, Group};

pub const PROGRAM: &str = "cmdt";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ZONES_COMPLETER: &str = "compute.zones";
pub const INSTANCES_COMPLETER: &str = "compute.instances";
pub const FILES_COMPLETER: &str = "files";
pub const COMPLETERS_COMPLETER: &str = "meta.completers";

pub fn tree() -> CommandTree {
    let root = Group::new(PROGRAM, "Manage compute resources and the cmdt installation.")
        .flag(
            ArgSpec::flag("quiet")
                .short('q')
                .boolean()
                .help("Disable all interactive prompts and accept defaults."),
        )
        .flag(
            ArgSpec::flag("stack-trace")
                .boolean()
                .help("Print the full error chain on failure."),
        )
        .flag(
            ArgSpec::flag("project").help("Project to operate on. Overrides the default project."),
        )
        .child(compute::group())
        .child(meta::group());
    CommandTree::new(root, VERSION)
}

pub fn completers() -> CompleterRegistry {
    let mut registry = CompleterRegistry::new()
        .with(
            ZONES_COMPLETER,
            ListCommandCompleter::new(
                ZONES_COMPLETER,
                &["compute", "zones", "list"],
                Column::new("name", "zones"),
            )
            .scope("project"),
        )
        .with(
            INSTANCES_COMPLETER,
            ListCommandCompleter::new(
                INSTANCES_COMPLETER,
                &["compute", "instances", "list"],
                Column::new("name", "instances"),
            )
            .column(Column::new("zone", "zones").flag("zone"))
            .scope("project"),
        )
        .with(FILES_COMPLETER, FileCompleter);
    let mut ids: Vec<String> = registry.ids().map(str::to_string).collect();
    ids.push(COMPLETERS_COMPLETER.to_string());
    registry.register(COMPLETERS_COMPLETER, StaticCompleter::new(ids));
    registry
}

/// The fixture service: the inventory named by settings, or the built-in
/// sample.
pub fn service(settings: &Settings) -> Result<Rc<dyn ResourceService>> {
    let service = match &settings.inventory {
        Some(path) => FixtureService::from_path(path).map_err(|e| {
            anyhow::anyhow!("failed to load inventory [{}]: {e}", path.display())
        })?,
        None => FixtureService::sample(),
    };
    Ok(Rc::new(service))
}

pub fn context(settings: Settings) -> Result<Context> {
    let service = service(&settings)?;
    Ok(Context::new(settings, tree(), completers(), service))
}

/// Left-aligned columns separated by two spaces.
pub(crate) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };
    let mut out = line(headers.to_vec());
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}
