//! Shell completion.
//!
//! The engine works purely from the [`TreeSnapshot`]: it splits the line up
//! to the cursor, walks the snapshot to the deepest node, and then offers
//! child names, flag names or argument values depending on what the last
//! (partial) word looks like. Argument values come from completers looked
//! up by identifier, from declared choices, or from the filesystem.

mod candidate;
mod completer;
mod files;
mod list;
pub mod protocol;

use std::path::{Path, PathBuf};

pub use candidate::{Candidate, filter_prefix, order};
pub use completer::{
    CommandRunner, Completer, CompleterRegistry, CompletionRequest, StaticCompleter,
};
pub use files::FileCompleter;
pub use list::{Column, DEFAULT_TIMEOUT_SECS, ListCommandCompleter};

use crate::cache::Cache;
use crate::cancel::CancelToken;
use crate::parser::{ArgParser, Namespace, ParseOutcome};
use crate::shell::split_partial;
use crate::snapshot::TreeSnapshot;
use crate::tree::{ArgSpec, ReleaseTrack, ValueType};

/// Where the word under the cursor sits.
#[derive(Debug)]
enum Slot<'a> {
    Children,
    FlagNames,
    /// `--flag=<partial>`: candidates keep the `--flag=` part.
    AttachedValue { spec: &'a ArgSpec, flag: String },
    Value(&'a ArgSpec),
    Nothing,
}

pub struct CompletionEngine<'a> {
    snapshot: &'a TreeSnapshot,
    completers: &'a CompleterRegistry,
    runner: &'a dyn CommandRunner,
    cancel: &'a CancelToken,
    cache: Option<&'a Cache>,
    cwd: PathBuf,
}

impl<'a> CompletionEngine<'a> {
    pub fn new(
        snapshot: &'a TreeSnapshot,
        completers: &'a CompleterRegistry,
        runner: &'a dyn CommandRunner,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            snapshot,
            completers,
            runner,
            cancel,
            cache: None,
            cwd: PathBuf::from("."),
        }
    }

    pub fn cache(mut self, cache: Option<&'a Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = cwd.as_ref().to_path_buf();
        self
    }

    /// Candidates for the last word of `line`, which holds everything up to
    /// the cursor including the program name.
    pub fn complete(&self, line: &str) -> crate::Result<Vec<Candidate>> {
        let split = split_partial(line);
        let partial = split.partial.as_str();
        let Some((_, words)) = split.words.split_first() else {
            return Ok(Vec::new());
        };

        let (track, words) = match words.first().and_then(|w| ReleaseTrack::from_prefix(w)) {
            Some(track) => (track, &words[1..]),
            None => (ReleaseTrack::Stable, words),
        };

        let lookup = self.snapshot.lookup(words, track);
        let node = lookup.node();
        let tail = &words[lookup.consumed..];
        let args = lookup.effective_args();

        if node.is_group() && tail.iter().any(|t| !t.starts_with('-')) {
            tracing::debug!(node = %node.name, "unknown command in completion line");
            return Ok(Vec::new());
        }

        let slot = classify(node.is_group(), &args, tail, partial);
        let candidates = match slot {
            Slot::Children => {
                let mut names: Vec<&str> = node
                    .visible_children(track)
                    .map(|c| c.name.as_str())
                    .collect();
                if lookup.consumed == 0 && track == ReleaseTrack::Stable {
                    names.extend(ReleaseTrack::ALL.iter().filter_map(|t| t.prefix()));
                }
                filter_prefix(names, partial)
            }
            Slot::FlagNames => flag_names(&args, tail, partial),
            Slot::AttachedValue { spec, flag } => {
                let value_prefix = &partial[flag.len() + 1..];
                let namespace = self.namespace(&args, tail);
                self.values(spec, value_prefix, &namespace)?
                    .into_iter()
                    .map(|c| Candidate::with_display(format!("{flag}={}", c.cell), c.display))
                    .collect()
            }
            Slot::Value(spec) => {
                let namespace = self.namespace(&args, tail);
                self.values(spec, partial, &namespace)?
            }
            Slot::Nothing => Vec::new(),
        };
        Ok(order(candidates, partial))
    }

    /// Arguments typed so far, parsed without validation.
    fn namespace(&self, args: &[ArgSpec], tail: &[String]) -> Namespace {
        match ArgParser::new(args).tolerant(true).parse(tail) {
            Ok(ParseOutcome::Parsed(namespace)) => namespace,
            Ok(ParseOutcome::Help) => Namespace::new(),
            Err(e) => {
                tracing::debug!(error = %e, "tolerant parse failed during completion");
                Namespace::new()
            }
        }
    }

    fn values(
        &self,
        spec: &ArgSpec,
        prefix: &str,
        namespace: &Namespace,
    ) -> crate::Result<Vec<Candidate>> {
        if let Some(id) = spec.completer.as_deref() {
            let Some(completer) = self.completers.get(id) else {
                tracing::warn!(completer = id, "unknown completer");
                return Ok(Vec::new());
            };
            let request =
                CompletionRequest::new(prefix, namespace, self.runner, self.cancel, &self.cwd)
                    .cache(self.cache)
                    .gri(spec.gri);
            return completer.complete(&request);
        }
        if let Some(choices) = spec.choice_values() {
            return Ok(filter_prefix(choices.iter().map(String::as_str), prefix));
        }
        match spec.value_type {
            ValueType::Boolean => Ok(filter_prefix(["true", "false"], prefix)),
            ValueType::Path => {
                let request =
                    CompletionRequest::new(prefix, namespace, self.runner, self.cancel, &self.cwd);
                FileCompleter.complete(&request)
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn find_flag<'s>(args: &'s [ArgSpec], token: &str) -> Option<&'s ArgSpec> {
    if let Some(body) = token.strip_prefix("--") {
        let name = body.split_once('=').map(|(n, _)| n).unwrap_or(body);
        return args.iter().find(|s| s.is_flag() && s.name == name);
    }
    let short = token.strip_prefix('-')?.chars().next()?;
    args.iter().find(|s| s.is_flag() && s.short == Some(short))
}

fn is_flag_token(token: &str) -> bool {
    token.starts_with('-') && token != "-" && token.parse::<f64>().is_err()
}

/// Index of the next positional and whether `--` was seen, or the
/// value-taking flag that is still waiting for its value.
fn pending<'s>(args: &'s [ArgSpec], tail: &[String]) -> Result<(usize, bool), &'s ArgSpec> {
    let mut positionals = 0;
    let mut i = 0;
    let mut end_of_flags = false;
    while i < tail.len() {
        let token = &tail[i];
        i += 1;
        if end_of_flags || !is_flag_token(token) {
            positionals += 1;
            continue;
        }
        if token == "--" {
            end_of_flags = true;
            continue;
        }
        let Some(spec) = find_flag(args, token) else {
            continue;
        };
        let attached = token.contains('=') || (!token.starts_with("--") && token.len() > 2);
        if spec.takes_value() && !attached {
            if i == tail.len() {
                return Err(spec);
            }
            i += 1;
        }
    }
    Ok((positionals, end_of_flags))
}

fn classify<'s>(is_group: bool, args: &'s [ArgSpec], tail: &[String], partial: &str) -> Slot<'s> {
    let progress = pending(args, tail);
    // After `--` every word is positional, dashes included.
    let end_of_flags = matches!(progress, Ok((_, true)));
    if partial.starts_with('-') && !end_of_flags {
        if let Some((flag, _)) = partial.split_once('=') {
            return match find_flag(args, flag) {
                Some(spec) if spec.takes_value() && flag.starts_with("--") => Slot::AttachedValue {
                    spec,
                    flag: flag.to_string(),
                },
                _ => Slot::Nothing,
            };
        }
        if let Err(spec) = progress {
            return Slot::Value(spec);
        }
        return Slot::FlagNames;
    }

    let next = match progress {
        Ok((next, _)) => next,
        Err(spec) => return Slot::Value(spec),
    };
    if is_group {
        return Slot::Children;
    }
    let positionals: Vec<&ArgSpec> = args.iter().filter(|a| a.is_positional()).collect();
    match positionals.get(next) {
        Some(spec) => Slot::Value(spec),
        None => match positionals.last() {
            Some(spec) if spec.repeated => Slot::Value(spec),
            _ => Slot::Nothing,
        },
    }
}

fn flag_names(args: &[ArgSpec], tail: &[String], partial: &str) -> Vec<Candidate> {
    let used: Vec<&str> = tail
        .iter()
        .filter_map(|t| find_flag(args, t))
        .filter(|s| !s.repeated && s.value_type != ValueType::KeyValue)
        .map(|s| s.name.as_str())
        .collect();
    let mut names: Vec<String> = args
        .iter()
        .filter(|s| s.is_flag() && !s.hidden && !used.contains(&s.name.as_str()))
        .map(|s| {
            if s.takes_value() {
                format!("--{}=", s.name)
            } else {
                format!("--{}", s.name)
            }
        })
        .collect();
    names.push("--help".to_string());
    filter_prefix(names.iter().map(String::as_str), partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CommandContext;
    use crate::tree::{Command, CommandTree, Group};
    use std::cell::Cell as Counter;

    fn noop(_: &mut CommandContext<'_>) -> crate::Result<()> {
        Ok(())
    }

    fn snapshot() -> TreeSnapshot {
        let root = Group::new("cmdt", "Test CLI.")
            .flag(ArgSpec::flag("quiet").short('q').boolean())
            .flag(ArgSpec::flag("project"))
            .child(
                Group::new("compute", "Compute.")
                    .child(
                        Group::new("instances", "Instances.")
                            .child(
                                Command::new("create", "Create.", noop)
                                    .arg(ArgSpec::positional("NAME"))
                                    .arg(ArgSpec::flag("zone").required().completer("zones"))
                                    .arg(
                                        ArgSpec::flag("machine-type")
                                            .choices(&["n1-standard-1", "e2-micro"]),
                                    )
                                    .arg(
                                        ArgSpec::flag("metadata-from-file").value(ValueType::Path),
                                    ),
                            )
                            .child(
                                Command::new("describe", "Describe.", noop)
                                    .arg(ArgSpec::positional("NAME").completer("instances"))
                                    .arg(ArgSpec::flag("zone").completer("zones")),
                            )
                            .child(
                                Command::new("simulate-maintenance", "Simulate.", noop)
                                    .track(ReleaseTrack::Experimental),
                            ),
                    )
                    .child(Group::new("zones", "Zones.")),
            );
        TreeSnapshot::from_tree(&CommandTree::new(root, "1.0"))
    }

    struct Counting(Counter<usize>);

    impl CommandRunner for Counting {
        fn run_capture(&self, _argv: &[String]) -> crate::Result<Vec<u8>> {
            self.0.set(self.0.get() + 1);
            Ok(Vec::new())
        }
    }

    fn complete(line: &str) -> Vec<String> {
        let snapshot = snapshot();
        let registry = CompleterRegistry::new()
            .with("zones", StaticCompleter::new(["zone-1", "zone-2", "east-1"]))
            .with("instances", StaticCompleter::new(["vm-1", "vm-2", "-vm-3"]));
        let runner = Counting(Counter::new(0));
        let cancel = CancelToken::new();
        CompletionEngine::new(&snapshot, &registry, &runner, &cancel)
            .complete(line)
            .unwrap()
            .into_iter()
            .map(|c| c.cell)
            .collect()
    }

    #[test]
    fn test_children_and_track_prefixes_at_root() {
        assert_eq!(complete("cmdt "), vec!["compute", "experimental", "pre-release"]);
        assert_eq!(complete("cmdt comp"), vec!["compute"]);
        assert_eq!(complete("cmdt compute "), vec!["instances", "zones"]);
    }

    #[test]
    fn test_track_hidden_children() {
        assert_eq!(complete("cmdt compute instances s"), Vec::<String>::new());
        assert_eq!(
            complete("cmdt experimental compute instances s"),
            vec!["simulate-maintenance"]
        );
    }

    #[test]
    fn test_flag_names_include_inherited_and_skip_used() {
        let flags = complete("cmdt compute instances create vm --zone=z1 --");
        assert!(flags.contains(&"--machine-type=".to_string()));
        assert!(flags.contains(&"--quiet".to_string()));
        assert!(flags.contains(&"--project=".to_string()));
        assert!(!flags.iter().any(|f| f.starts_with("--zone")));
        assert_eq!(complete("cmdt compute instances create --ma"), vec!["--machine-type="]);
    }

    #[test]
    fn test_flag_values_from_completer_and_choices() {
        assert_eq!(
            complete("cmdt compute instances create vm --zone zo"),
            vec!["zone-1", "zone-2"]
        );
        assert_eq!(
            complete("cmdt compute instances create vm --zone=zo"),
            vec!["--zone=zone-1", "--zone=zone-2"]
        );
        assert_eq!(
            complete("cmdt compute instances create vm --machine-type e"),
            vec!["e2-micro"]
        );
    }

    #[test]
    fn test_positional_uses_its_completer() {
        assert_eq!(
            complete("cmdt compute instances describe --zone z1 v"),
            vec!["vm-1", "vm-2"]
        );
        assert!(complete("cmdt compute instances describe vm-1 v").is_empty());
    }

    #[test]
    fn test_dash_words_after_double_dash_are_positional() {
        assert_eq!(complete("cmdt compute instances describe -- -"), vec!["-vm-3"]);
        assert!(
            complete("cmdt compute instances describe -")
                .contains(&"--zone=".to_string())
        );
        assert!(complete("cmdt compute instances describe -- vm-1 -").is_empty());
    }

    #[test]
    fn test_unknown_command_yields_nothing() {
        assert!(complete("cmdt compute bogus ").is_empty());
        assert!(complete("").is_empty());
    }
}
