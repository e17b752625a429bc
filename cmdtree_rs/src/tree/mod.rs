//! Command tree: groups, leaf commands and resolution of leading tokens.
//!
//! Groups carry flags inherited by everything beneath them; commands carry
//! their own arguments and a [`Handler`]. Every node declares the least
//! stable [`ReleaseTrack`] it needs, and resolution hides nodes the selected
//! track does not admit.

pub mod help;
mod schema;
mod track;

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use strsim::levenshtein;
use thiserror::Error;

pub use schema::{ArgKind, ArgSpec, ValueType};
pub use track::ReleaseTrack;

use crate::driver::Handler;

/// Maximum edit distance for "did you mean" suggestions.
pub(crate) const SUGGESTION_DISTANCE: usize = 2;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Invalid choice: '{token}'.{}", suggestion_suffix(.suggestion))]
    CommandNotFound {
        path: String,
        token: String,
        suggestion: Option<String>,
    },

    #[error("Ambiguous command '{token}'. Candidates: {}.", .candidates.join(", "))]
    AmbiguousCommand {
        path: String,
        token: String,
        candidates: Vec<String>,
    },

    #[error("Command name argument expected.")]
    CommandExpected { path: String },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" Maybe you meant: {s}"))
        .unwrap_or_default()
}

/// Closest candidate within [`SUGGESTION_DISTANCE`] edits.
pub(crate) fn suggest<'a, I>(input: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let input = input.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let distance = levenshtein(&input, candidate);
        if distance > SUGGESTION_DISTANCE {
            continue;
        }
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub help: String,
    pub track: ReleaseTrack,
    /// Flags inherited by every descendant.
    pub flags: Vec<ArgSpec>,
    pub children: Vec<Node>,
}

impl Group {
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            track: ReleaseTrack::Stable,
            flags: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn track(mut self, track: ReleaseTrack) -> Self {
        self.track = track;
        self
    }

    pub fn flag(mut self, spec: ArgSpec) -> Self {
        self.flags.push(spec);
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name() == name)
    }

    pub fn visible_children(&self, track: ReleaseTrack) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |c| track.admits(c.track()))
    }
}

#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub help: String,
    pub track: ReleaseTrack,
    pub args: Vec<ArgSpec>,
    pub handler: Rc<dyn Handler>,
}

impl Command {
    pub fn new(name: &str, help: &str, handler: impl Handler + 'static) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            track: ReleaseTrack::Stable,
            args: Vec::new(),
            handler: Rc::new(handler),
        }
    }

    pub fn track(mut self, track: ReleaseTrack) -> Self {
        self.track = track;
        self
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("track", &self.track)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Group(Group),
    Command(Command),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Group(g) => &g.name,
            Node::Command(c) => &c.name,
        }
    }

    pub fn help(&self) -> &str {
        match self {
            Node::Group(g) => &g.help,
            Node::Command(c) => &c.help,
        }
    }

    pub fn track(&self) -> ReleaseTrack {
        match self {
            Node::Group(g) => g.track,
            Node::Command(c) => c.track,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Node::Group(_))
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(group)
    }
}

impl From<Command> for Node {
    fn from(command: Command) -> Self {
        Node::Command(command)
    }
}

/// The deepest node reached by [`CommandTree::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    /// Groups on the path, root first.
    pub groups: Vec<&'a Group>,
    pub command: Option<&'a Command>,
    /// Node names after the program name.
    pub path: Vec<String>,
    /// Number of input tokens consumed by resolution.
    pub consumed: usize,
    pub track: ReleaseTrack,
}

impl Resolved<'_> {
    pub fn program(&self) -> &str {
        self.groups.first().map(|g| g.name.as_str()).unwrap_or_default()
    }

    /// `cmdt compute instances list`
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program().to_string()];
        parts.extend(self.track.prefix().map(str::to_string));
        parts.extend(self.path.iter().cloned());
        parts.join(" ")
    }

    /// `cmdt.compute.instances.list`, used to prefix error messages.
    pub fn dotted(&self) -> String {
        std::iter::once(self.program())
            .chain(self.path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn help(&self) -> &str {
        match (self.command, self.groups.last()) {
            (Some(command), _) => &command.help,
            (None, Some(group)) => &group.help,
            (None, None) => "",
        }
    }

    /// Arguments accepted at this node: its own first, then inherited group
    /// flags from the nearest group outwards. A closer declaration shadows
    /// an outer one with the same name.
    pub fn effective_args(&self) -> Vec<ArgSpec> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let own = self.command.map(|c| c.args.as_slice()).unwrap_or_default();
        let inherited = self.groups.iter().rev().flat_map(|g| g.flags.iter());
        for spec in own.iter().chain(inherited) {
            if seen.insert(spec.name.clone()) {
                out.push(spec.clone());
            }
        }
        out
    }
}

/// Root of the command hierarchy plus the CLI version used to key
/// completion snapshots.
#[derive(Debug, Clone)]
pub struct CommandTree {
    root: Group,
    version: String,
}

impl CommandTree {
    pub fn new(root: Group, version: &str) -> Self {
        Self {
            root,
            version: version.to_string(),
        }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn program(&self) -> &str {
        &self.root.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Consumes leading tokens naming visible children. Stops at the first
    /// command, at the first flag-looking token, or when tokens run out.
    pub fn resolve(
        &self,
        tokens: &[String],
        track: ReleaseTrack,
    ) -> Result<Resolved<'_>, ResolutionError> {
        let mut resolved = Resolved {
            groups: vec![&self.root],
            command: None,
            path: Vec::new(),
            consumed: 0,
            track,
        };

        while let Some(token) = tokens.get(resolved.consumed) {
            if token.starts_with('-') {
                break;
            }
            let Some(group) = resolved.groups.last().copied() else {
                break;
            };

            match group.find_child(token) {
                Some(child) if track.admits(child.track()) => {
                    resolved.path.push(token.clone());
                    resolved.consumed += 1;
                    match child {
                        Node::Group(g) => resolved.groups.push(g),
                        Node::Command(c) => {
                            resolved.command = Some(c);
                            break;
                        }
                    }
                }
                Some(child) => {
                    let mut suggestion = vec![self.program().to_string()];
                    suggestion.extend(child.track().prefix().map(str::to_string));
                    suggestion.extend(resolved.path.iter().cloned());
                    suggestion.push(token.clone());
                    return Err(ResolutionError::CommandNotFound {
                        path: resolved.dotted(),
                        token: token.clone(),
                        suggestion: Some(suggestion.join(" ")),
                    });
                }
                None => {
                    let visible: Vec<&str> =
                        group.visible_children(track).map(Node::name).collect();
                    let prefixed: Vec<&str> = visible
                        .iter()
                        .copied()
                        .filter(|name| name.starts_with(token.as_str()))
                        .collect();
                    if prefixed.len() >= 2 {
                        return Err(ResolutionError::AmbiguousCommand {
                            path: resolved.dotted(),
                            token: token.clone(),
                            candidates: prefixed.iter().map(|s| s.to_string()).collect(),
                        });
                    }
                    let close = prefixed
                        .first()
                        .copied()
                        .or_else(|| suggest(token, visible.iter().copied()));
                    return Err(ResolutionError::CommandNotFound {
                        path: resolved.dotted(),
                        token: token.clone(),
                        suggestion: close.map(|name| {
                            let mut line = resolved.command_line();
                            line.push(' ');
                            line.push_str(name);
                            line
                        }),
                    });
                }
            }
        }

        Ok(resolved)
    }
}
