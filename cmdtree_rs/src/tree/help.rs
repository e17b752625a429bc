//! Help and usage text generated from the tree.

use std::fmt::Write;

use super::{ArgSpec, Node, ReleaseTrack, Resolved};

/// One-line synopsis: `cmdt compute instances create NAME --zone=ZONE [optional flags]`.
pub fn usage_line(resolved: &Resolved<'_>) -> String {
    let mut line = resolved.command_line();
    if resolved.command.is_none() {
        line.push_str(" COMMAND");
        return line;
    }
    let args = resolved.effective_args();
    for spec in args.iter().filter(|a| a.is_positional()) {
        line.push(' ');
        let mut word = spec.metavar();
        if spec.repeated {
            word = format!("{word} [{word} ...]");
        }
        if spec.required {
            line.push_str(&word);
        } else {
            let _ = write!(line, "[{word}]");
        }
    }
    for spec in args.iter().filter(|a| a.is_flag() && a.required) {
        let _ = write!(line, " {}", flag_synopsis(spec));
    }
    if args.iter().any(|a| a.is_flag() && !a.required && !a.hidden) {
        line.push_str(" [optional flags]");
    }
    line
}

fn flag_synopsis(spec: &ArgSpec) -> String {
    if spec.takes_value() {
        format!("--{}={}", spec.name, spec.metavar())
    } else {
        format!("--{}", spec.name)
    }
}

fn describe(spec: &ArgSpec) -> String {
    let mut text = spec.help.clone();
    if let Some(choices) = spec.choice_values() {
        let _ = write!(text, " {} must be one of: {}.", spec.metavar(), choices.join(", "));
    }
    if let Some(default) = &spec.default {
        let _ = write!(text, " Default: {default}.");
    }
    text.trim().to_string()
}

fn push_section(out: &mut String, title: &str, entries: &[(String, String)]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}");
    for (term, description) in entries {
        let _ = writeln!(out, "    {term}");
        if !description.is_empty() {
            let _ = writeln!(out, "        {description}");
        }
    }
}

/// Full help for the resolved node.
pub fn render(resolved: &Resolved<'_>) -> String {
    let mut out = String::new();
    let summary = resolved.help().lines().next().unwrap_or_default();
    let _ = writeln!(out, "NAME");
    if summary.is_empty() {
        let _ = writeln!(out, "    {}", resolved.command_line());
    } else {
        let _ = writeln!(out, "    {} - {}", resolved.command_line(), summary);
    }
    let _ = writeln!(out, "\nSYNOPSIS");
    let _ = writeln!(out, "    {}", usage_line(resolved));

    let own: &[ArgSpec] = resolved
        .command
        .map(|c| c.args.as_slice())
        .unwrap_or_default();
    let own_names: Vec<&str> = own.iter().map(|a| a.name.as_str()).collect();
    let args = resolved.effective_args();

    let positionals: Vec<(String, String)> = args
        .iter()
        .filter(|a| a.is_positional())
        .map(|a| (a.metavar(), describe(a)))
        .collect();
    let entry = |a: &ArgSpec| {
        let term = match a.short {
            Some(short) => format!("{}, -{short}", flag_synopsis(a)),
            None => flag_synopsis(a),
        };
        (term, describe(a))
    };
    let required: Vec<(String, String)> = args
        .iter()
        .filter(|a| a.is_flag() && !a.hidden && a.required)
        .map(entry)
        .collect();
    let optional: Vec<(String, String)> = args
        .iter()
        .filter(|a| a.is_flag() && !a.hidden && !a.required)
        .filter(|a| own_names.contains(&a.name.as_str()))
        .map(entry)
        .collect();
    let inherited: Vec<(String, String)> = args
        .iter()
        .filter(|a| a.is_flag() && !a.hidden && !a.required)
        .filter(|a| !own_names.contains(&a.name.as_str()))
        .map(entry)
        .collect();

    push_section(&mut out, "POSITIONAL ARGUMENTS", &positionals);
    push_section(&mut out, "REQUIRED FLAGS", &required);
    push_section(&mut out, "FLAGS", &optional);
    push_section(&mut out, "GLOBAL FLAGS", &inherited);

    if resolved.command.is_none() {
        if let Some(group) = resolved.groups.last() {
            let (groups, commands): (Vec<&Node>, Vec<&Node>) = group
                .visible_children(resolved.track)
                .partition(|n| n.is_group());
            let list = |nodes: Vec<&Node>| -> Vec<(String, String)> {
                nodes
                    .into_iter()
                    .map(|n| (n.name().to_string(), first_line(n.help()).to_string()))
                    .collect()
            };
            push_section(&mut out, "GROUPS", &list(groups));
            push_section(&mut out, "COMMANDS", &list(commands));
        }
    }

    if resolved.track != ReleaseTrack::Stable {
        let _ = writeln!(
            out,
            "\nNOTES\n    This command is currently in {}.",
            resolved.track
        );
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
