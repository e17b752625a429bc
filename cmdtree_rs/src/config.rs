//! Environment-driven settings.
//!
//! Everything is read through a lookup function so tests can inject an
//! environment without touching the process one.

use std::path::{Path, PathBuf};

pub const ENV_CACHE_DIR: &str = "CMDT_CACHE_DIR";
pub const ENV_SNAPSHOT: &str = "CMDT_SNAPSHOT";
pub const ENV_LOG: &str = "CMDT_LOG";
pub const ENV_INVENTORY: &str = "CMDT_INVENTORY";

/// Name of the cache shared by completers and handlers.
pub const RESOURCE_CACHE_NAME: &str = "resource.cache";
/// Bump when the on-disk row layout of completer tables changes.
pub const RESOURCE_CACHE_VERSION: &str = "1";

const DEFAULT_LOG_FILTER: &str = "warn";
const SNAPSHOT_FILE: &str = "completion_tree.json";

/// Default cache root: `<user cache dir>/cmdtree`, or `.cmdtree` when the
/// platform reports no cache directory.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("cmdtree"))
        .unwrap_or_else(|| PathBuf::from(".cmdtree"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding persistent caches.
    pub cache_root: PathBuf,
    /// Completion tree snapshot file.
    pub snapshot_path: PathBuf,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Optional JSON inventory for the fixture service.
    pub inventory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_root(default_cache_root())
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_root = non_empty(ENV_CACHE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_root);
        let snapshot_path = non_empty(ENV_SNAPSHOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| cache_root.join(SNAPSHOT_FILE));

        Self {
            cache_root,
            snapshot_path,
            log_filter: non_empty(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            inventory: non_empty(ENV_INVENTORY).map(PathBuf::from),
        }
    }

    /// Settings rooted at `root`, with the snapshot stored alongside caches.
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let cache_root = root.as_ref().to_path_buf();
        Self {
            snapshot_path: cache_root.join(SNAPSHOT_FILE),
            cache_root,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            inventory: None,
        }
    }

    pub fn with_inventory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inventory = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings.cache_root, default_cache_root());
        assert_eq!(
            settings.snapshot_path,
            default_cache_root().join("completion_tree.json")
        );
        assert_eq!(settings.log_filter, "warn");
        assert!(settings.inventory.is_none());
    }

    #[test]
    fn test_snapshot_follows_cache_dir() {
        let settings = Settings::from_lookup(lookup(&[(ENV_CACHE_DIR, "/tmp/cmdt")]));
        assert_eq!(settings.cache_root, PathBuf::from("/tmp/cmdt"));
        assert_eq!(
            settings.snapshot_path,
            PathBuf::from("/tmp/cmdt/completion_tree.json")
        );
    }

    #[test]
    fn test_explicit_values_win() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_CACHE_DIR, "/tmp/cmdt"),
            (ENV_SNAPSHOT, "/tmp/tree.json"),
            (ENV_LOG, "cmdtree=debug"),
            (ENV_INVENTORY, "/tmp/inv.json"),
        ]));
        assert_eq!(settings.snapshot_path, PathBuf::from("/tmp/tree.json"));
        assert_eq!(settings.log_filter, "cmdtree=debug");
        assert_eq!(settings.inventory, Some(PathBuf::from("/tmp/inv.json")));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let settings = Settings::from_lookup(lookup(&[(ENV_LOG, "  ")]));
        assert_eq!(settings.log_filter, "warn");
    }
}
