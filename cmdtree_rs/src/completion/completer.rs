use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use super::candidate::{Candidate, filter_prefix};
use crate::cache::Cache;
use crate::cancel::CancelToken;
use crate::parser::Namespace;

/// Runs a command-tree invocation and captures its standard output.
/// A non-zero exit comes back as the invocation's error.
pub trait CommandRunner {
    fn run_capture(&self, argv: &[String]) -> crate::Result<Vec<u8>>;
}

/// Everything a completer may look at.
pub struct CompletionRequest<'a> {
    /// The word being completed.
    pub prefix: &'a str,
    /// Arguments parsed so far, in tolerant mode.
    pub namespace: &'a Namespace,
    /// Open resource cache, when one could be opened.
    pub cache: Option<&'a Cache>,
    pub runner: &'a dyn CommandRunner,
    pub cancel: &'a CancelToken,
    /// Scope flags appended to every candidate regardless of ambiguity.
    pub qualify: &'a [String],
    /// Render candidates as `name:scope1:scope2`.
    pub gri: bool,
    /// Base directory for filesystem completion.
    pub cwd: &'a Path,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(
        prefix: &'a str,
        namespace: &'a Namespace,
        runner: &'a dyn CommandRunner,
        cancel: &'a CancelToken,
        cwd: &'a Path,
    ) -> Self {
        Self {
            prefix,
            namespace,
            cache: None,
            runner,
            cancel,
            qualify: &[],
            gri: false,
            cwd,
        }
    }

    pub fn cache(mut self, cache: Option<&'a Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn qualify(mut self, flags: &'a [String]) -> Self {
        self.qualify = flags;
        self
    }

    pub fn gri(mut self, gri: bool) -> Self {
        self.gri = gri;
        self
    }
}

pub trait Completer {
    /// Candidates for `request.prefix`, unordered.
    fn complete(&self, request: &CompletionRequest<'_>) -> crate::Result<Vec<Candidate>>;

    /// One-line description for `meta cache completers list`.
    fn describe(&self) -> String;
}

/// Completer over a fixed value list.
#[derive(Debug, Clone)]
pub struct StaticCompleter {
    values: Vec<String>,
}

impl StaticCompleter {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Completer for StaticCompleter {
    fn complete(&self, request: &CompletionRequest<'_>) -> crate::Result<Vec<Candidate>> {
        Ok(filter_prefix(
            self.values.iter().map(String::as_str),
            request.prefix,
        ))
    }

    fn describe(&self) -> String {
        format!("static values: {}", self.values.join(", "))
    }
}

/// Completers by identifier, as referenced from argument schemas.
#[derive(Default, Clone)]
pub struct CompleterRegistry {
    completers: BTreeMap<String, Rc<dyn Completer>>,
}

impl CompleterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, completer: impl Completer + 'static) {
        self.completers.insert(id.to_string(), Rc::new(completer));
    }

    pub fn with(mut self, id: &str, completer: impl Completer + 'static) -> Self {
        self.register(id, completer);
        self
    }

    pub fn get(&self, id: &str) -> Option<Rc<dyn Completer>> {
        self.completers.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.completers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<dyn Completer>)> {
        self.completers.iter().map(|(id, c)| (id.as_str(), c))
    }
}

impl std::fmt::Debug for CompleterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.completers.keys()).finish()
    }
}
