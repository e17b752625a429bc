//! Completion tree snapshot.
//!
//! Completion runs on every TAB press, so it never walks the live command
//! tree. Instead a serialized copy of the tree (names, tracks, flags,
//! positionals, completer ids) is kept on disk and rebuilt when it is
//! missing, unreadable, or written by a different CLI version.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::fs_utils::{FileLock, remove_file_if_exists, write_atomic};
use crate::tree::{ArgSpec, CommandTree, Group, Node, ReleaseTrack};

/// Current schema version for the snapshot format
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Schema version for compatibility checking
    #[serde(default)]
    pub schema_version: String,
    /// Version of the CLI whose tree was captured
    #[serde(default)]
    pub cli_version: String,
    /// Timestamp when the snapshot was generated (ISO 8601)
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub node_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Group,
    Command,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub track: ReleaseTrack,
    /// First line of the node's help text.
    #[serde(default)]
    pub summary: String,
    /// Group: flags inherited by descendants. Command: its own flags.
    #[serde(default)]
    pub flags: Vec<ArgSpec>,
    #[serde(default)]
    pub positionals: Vec<ArgSpec>,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    fn from_group(group: &Group) -> Self {
        Self {
            name: group.name.clone(),
            kind: NodeKind::Group,
            track: group.track,
            summary: first_line(&group.help),
            flags: group.flags.clone(),
            positionals: Vec::new(),
            children: group.children.iter().map(Self::from_node).collect(),
        }
    }

    fn from_node(node: &Node) -> Self {
        match node {
            Node::Group(group) => Self::from_group(group),
            Node::Command(command) => Self {
                name: command.name.clone(),
                kind: NodeKind::Command,
                track: command.track,
                summary: first_line(&command.help),
                flags: command.args.iter().filter(|a| a.is_flag()).cloned().collect(),
                positionals: command
                    .args
                    .iter()
                    .filter(|a| a.is_positional())
                    .cloned()
                    .collect(),
                children: Vec::new(),
            },
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    pub fn visible_children(&self, track: ReleaseTrack) -> impl Iterator<Item = &SnapshotNode> {
        self.children.iter().filter(move |c| track.admits(c.track))
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

/// Result of [`TreeSnapshot::lookup`].
#[derive(Clone, Debug)]
pub struct Lookup<'a> {
    /// Nodes on the matched path, root first.
    pub nodes: Vec<&'a SnapshotNode>,
    /// Number of tokens matched.
    pub consumed: usize,
}

impl<'a> Lookup<'a> {
    /// Deepest matched node.
    pub fn node(&self) -> &'a SnapshotNode {
        self.nodes[self.nodes.len() - 1]
    }

    /// Flags and positionals accepted at the deepest node, own before
    /// inherited, closer declarations shadowing outer ones.
    pub fn effective_args(&self) -> Vec<ArgSpec> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let node = self.node();
        let own = node.positionals.iter().chain(node.flags.iter());
        let inherited = self
            .nodes
            .iter()
            .rev()
            .skip(1)
            .flat_map(|n| n.flags.iter());
        for spec in own.chain(inherited) {
            if seen.insert((spec.kind, spec.name.clone())) {
                out.push(spec.clone());
            }
        }
        out
    }
}

/// Serialized command tree used by completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub metadata: SnapshotMetadata,
    pub root: SnapshotNode,
}

impl TreeSnapshot {
    pub fn from_tree(tree: &CommandTree) -> Self {
        let root = SnapshotNode::from_group(tree.root());
        let generated_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Iso8601::DEFAULT)
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            metadata: SnapshotMetadata {
                schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
                cli_version: tree.version().to_string(),
                generated_at,
                node_count: root.count(),
            },
            root,
        }
    }

    /// Follows `path` by successive name match among children visible on
    /// `track`; unmatched tokens are left for the caller.
    pub fn lookup(&self, path: &[String], track: ReleaseTrack) -> Lookup<'_> {
        let mut nodes = vec![&self.root];
        let mut consumed = 0;
        for token in path {
            let current = nodes[nodes.len() - 1];
            if !current.is_group() {
                break;
            }
            match current.visible_children(track).find(|c| &c.name == token) {
                Some(child) => {
                    nodes.push(child);
                    consumed += 1;
                }
                None => break,
            }
        }
        Lookup { nodes, consumed }
    }

    fn is_current(&self, tree: &CommandTree) -> bool {
        self.metadata.schema_version == SNAPSHOT_SCHEMA_VERSION
            && self.metadata.cli_version == tree.version()
    }
}

/// On-disk store for [`TreeSnapshot`], memoized per process.
#[derive(Debug)]
pub struct CompletionTreeStore {
    path: PathBuf,
    loaded: RefCell<Option<Rc<TreeSnapshot>>>,
}

impl CompletionTreeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read_current(&self, tree: &CommandTree) -> Option<TreeSnapshot> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read completion tree");
                return None;
            }
        };
        match serde_json::from_slice::<TreeSnapshot>(&content) {
            Ok(snapshot) if snapshot.is_current(tree) => Some(snapshot),
            Ok(snapshot) => {
                tracing::debug!(
                    found = %snapshot.metadata.cli_version,
                    expected = %tree.version(),
                    "completion tree is stale"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "completion tree is corrupt; rebuilding");
                None
            }
        }
    }

    /// Returns the current snapshot, rebuilding it when missing or stale.
    pub fn load(&self, tree: &CommandTree) -> io::Result<Rc<TreeSnapshot>> {
        if let Some(snapshot) = self.loaded.borrow().as_ref() {
            if snapshot.is_current(tree) {
                return Ok(Rc::clone(snapshot));
            }
        }
        if let Some(snapshot) = self.read_current(tree) {
            let snapshot = Rc::new(snapshot);
            *self.loaded.borrow_mut() = Some(Rc::clone(&snapshot));
            return Ok(snapshot);
        }
        self.rebuild_locked(tree, false)
    }

    /// Rebuilds from the live tree and atomically replaces the file.
    pub fn rebuild(&self, tree: &CommandTree) -> io::Result<Rc<TreeSnapshot>> {
        self.rebuild_locked(tree, true)
    }

    fn rebuild_locked(&self, tree: &CommandTree, force: bool) -> io::Result<Rc<TreeSnapshot>> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let _lock = FileLock::acquire(&self.lock_path())?;

        // Another process may have rebuilt it while we waited for the lock.
        let existing = if force { None } else { self.read_current(tree) };
        let snapshot = match existing {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = TreeSnapshot::from_tree(tree);
                let json = serde_json::to_vec_pretty(&snapshot)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                write_atomic(&self.path, &json)?;
                tracing::info!(
                    path = %self.path.display(),
                    nodes = snapshot.metadata.node_count,
                    "rebuilt completion tree"
                );
                snapshot
            }
        };

        let snapshot = Rc::new(snapshot);
        *self.loaded.borrow_mut() = Some(Rc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Removes the stored snapshot so the next load rebuilds it.
    pub fn invalidate(&self) -> io::Result<()> {
        self.loaded.borrow_mut().take();
        remove_file_if_exists(&self.path)
    }
}
