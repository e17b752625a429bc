use super::{COMPLETERS_COMPLETER, render_table};
use crate::cache::TableOptions;
use crate::completion::{Candidate, CompletionRequest, order};
use crate::driver::CommandContext;
use crate::error::{Error, Result};
use crate::parser::{ArgumentError, Namespace, Value};
use crate::tree::{ArgSpec, Command, Group, ReleaseTrack, ValueType};

pub(super) fn group() -> Group {
    let completers = Group::new("completers", "Inspect and run registered completers.")
        .child(Command::new(
            "list",
            "List registered completers.",
            completers_list,
        ))
        .child(
            Command::new(
                "run",
                "Run a completer as TAB would.\n\
                 Without PREFIX, reads prefixes interactively until end of input.",
                completers_run,
            )
            .arg(
                ArgSpec::positional("COMPLETER")
                    .completer(COMPLETERS_COMPLETER)
                    .help("Completer identifier."),
            )
            .arg(
                ArgSpec::positional("PREFIX")
                    .optional()
                    .help("Word to complete."),
            )
            .arg(
                ArgSpec::flag("qualify")
                    .repeated()
                    .help("Always qualify candidates with this scope flag."),
            )
            .arg(
                ArgSpec::flag("scope")
                    .value(ValueType::KeyValue)
                    .help("Scope flags as FLAG=VALUE pairs, as if given on the command line."),
            )
            .arg(
                ArgSpec::flag("gri")
                    .boolean()
                    .help("Render candidates as NAME:SCOPE identifiers."),
            ),
        );

    let cache = Group::new("cache", "Manage the resource cache.")
        .child(
            Command::new("list", "List cached completer tables.", cache_list).arg(
                ArgSpec::positional("GLOB")
                    .optional()
                    .help("Only list tables matching this glob."),
            ),
        )
        .child(Command::new(
            "delete",
            "Delete the resource cache.",
            cache_delete,
        ))
        .child(completers);

    let tree = Group::new("completion-tree", "Manage the completion tree.")
        .child(Command::new(
            "rebuild",
            "Regenerate the completion tree from the installed commands.",
            tree_rebuild,
        ))
        .child(
            Command::new("show", "Print a completion tree node as JSON.", tree_show).arg(
                ArgSpec::positional("PATH")
                    .optional()
                    .repeated()
                    .help("Command path below the root, e.g. compute instances."),
            ),
        );

    Group::new("meta", "Inspect the cmdt installation.")
        .child(cache)
        .child(tree)
}

fn cache_list(cx: &mut CommandContext<'_>) -> Result<()> {
    let cache = cx.cache()?;
    let pattern = cx.args.str("glob").map(str::to_string);
    let mut rows = Vec::new();
    for name in cache.select(pattern.as_deref())? {
        let table = cache.table(&name, TableOptions::new().create(false))?;
        rows.push(vec![
            name,
            table.columns()?.to_string(),
            format!("{}s", table.timeout()?),
            if table.is_expired()? { "yes" } else { "no" }.to_string(),
        ]);
    }
    cx.out.extend_from_slice(
        render_table(&["TABLE", "COLUMNS", "TIMEOUT", "EXPIRED"], &rows).as_bytes(),
    );
    Ok(())
}

fn cache_delete(cx: &mut CommandContext<'_>) -> Result<()> {
    let cache = cx.cache()?;
    let path = cache.path().display().to_string();
    let message = format!("The resource cache [{path}] will be deleted.");
    if !cx.confirm(&message, true)? {
        return Err(Error::failed(1, "Aborted by user."));
    }
    cache.delete()?;
    cx.status(format!("Deleted resource cache [{path}]."))
}

fn completers_list(cx: &mut CommandContext<'_>) -> Result<()> {
    let rows: Vec<Vec<String>> = cx
        .context()
        .completers()
        .iter()
        .map(|(id, completer)| vec![id.to_string(), completer.describe()])
        .collect();
    cx.out
        .extend_from_slice(render_table(&["COMPLETER", "DESCRIPTION"], &rows).as_bytes());
    Ok(())
}

fn completers_run(cx: &mut CommandContext<'_>) -> Result<()> {
    let ctx = cx.context();
    let id = cx.args.str("completer").unwrap_or_default().to_string();
    let completer = ctx.completers().get(&id).ok_or_else(|| {
        ArgumentError::invalid("COMPLETER", &id, format!("Unknown completer [{id}]."))
    })?;

    let mut scope = Namespace::new();
    if let Some(pairs) = cx.args.get("scope").and_then(Value::as_map) {
        for (flag, value) in pairs {
            scope.set(&flag.replace('-', "_"), Value::Str(value.clone()));
        }
    }
    let qualify = cx.args.strings("qualify");
    let gri = cx.args.flag("gri");
    let cache = cx.cache()?;

    let run = |prefix: &str| -> Result<Vec<Candidate>> {
        let request = CompletionRequest::new(prefix, &scope, ctx, ctx.cancel_token(), ctx.cwd())
            .cache(Some(&cache))
            .qualify(&qualify)
            .gri(gri);
        Ok(order(completer.complete(&request)?, prefix))
    };

    if let Some(prefix) = cx.args.str("prefix").map(str::to_string) {
        for candidate in run(&prefix)? {
            cx.print(candidate.cell)?;
        }
        return Ok(());
    }
    while let Some(prefix) = ctx.prompter().read_line("COMPLETE> ")? {
        for candidate in run(prefix.trim())? {
            cx.print(format!("  {}", candidate.cell))?;
        }
    }
    Ok(())
}

fn tree_rebuild(cx: &mut CommandContext<'_>) -> Result<()> {
    let ctx = cx.context();
    let snapshot = ctx.snapshots().rebuild(ctx.tree())?;
    cx.status(format!(
        "Rebuilt completion tree [{}] ({} nodes).",
        ctx.snapshots().path().display(),
        snapshot.metadata.node_count
    ))
}

fn tree_show(cx: &mut CommandContext<'_>) -> Result<()> {
    let ctx = cx.context();
    let path = cx.args.strings("path");
    let snapshot = ctx.snapshots().load(ctx.tree())?;
    let lookup = snapshot.lookup(&path, ReleaseTrack::Experimental);
    if lookup.consumed < path.len() {
        return Err(Error::failed(
            1,
            format!(
                "[{}] is not in the completion tree.",
                path[..=lookup.consumed].join(" ")
            ),
        ));
    }
    cx.print(serde_json::to_string_pretty(lookup.node())?)
}
