//! Invocation driver.
//!
//! [`Context`] owns everything an invocation touches: settings, the command
//! tree, completers, the resource service, the clock, the prompter, the
//! cancellation token, the lazily opened resource cache and the completion
//! tree store. [`Context::invoke`] runs one command line and captures its
//! output; nested invocations (completer update commands) share the same
//! cache handle, which is committed when the outermost invocation ends.

mod handler;
pub mod prompt;

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

pub use handler::{CommandContext, Handler};
pub use prompt::{NonInteractive, Prompter, ScriptedPrompter, TerminalPrompter};

use crate::cache::{Cache, CacheError, OpenOptions};
use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::completion::{Candidate, CommandRunner, CompleterRegistry, CompletionEngine};
use crate::config::{RESOURCE_CACHE_NAME, RESOURCE_CACHE_VERSION, Settings};
use crate::error::{EXIT_FAILURE, EXIT_OK, Error, Result};
use crate::parser::{ArgParser, ParseOutcome};
use crate::service::ResourceService;
use crate::shell;
use crate::snapshot::CompletionTreeStore;
use crate::tree::{CommandTree, ReleaseTrack, ResolutionError, help};

pub const STACK_TRACE_FLAG: &str = "--stack-trace";

/// Captured result of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl Invocation {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == EXIT_OK
    }
}

/// Result of a completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub candidates: Vec<Candidate>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl Completion {
    pub fn cells(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.cell.clone()).collect()
    }
}

/// What the error report needs to know about how far an invocation got.
struct Trace {
    dotted: String,
    usage: Option<String>,
}

fn wants_stack_trace<S: AsRef<str>>(tokens: &[S]) -> bool {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .take_while(|t| *t != "--")
        .any(|t| t == STACK_TRACE_FLAG)
}

pub struct Context {
    settings: Settings,
    tree: CommandTree,
    completers: CompleterRegistry,
    service: Rc<dyn ResourceService>,
    clock: Rc<dyn Clock>,
    prompter: Rc<dyn Prompter>,
    cancel: CancelToken,
    cache: RefCell<Option<Cache>>,
    snapshots: CompletionTreeStore,
    depth: Cell<usize>,
    cwd: PathBuf,
}

impl Context {
    pub fn new(
        settings: Settings,
        tree: CommandTree,
        completers: CompleterRegistry,
        service: Rc<dyn ResourceService>,
    ) -> Self {
        let snapshots = CompletionTreeStore::new(&settings.snapshot_path);
        Self {
            settings,
            tree,
            completers,
            service,
            clock: Rc::new(SystemClock),
            prompter: Rc::new(TerminalPrompter),
            cancel: CancelToken::new(),
            cache: RefCell::new(None),
            snapshots,
            depth: Cell::new(0),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_prompter(mut self, prompter: Rc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn completers(&self) -> &CompleterRegistry {
        &self.completers
    }

    pub fn service(&self) -> &dyn ResourceService {
        self.service.as_ref()
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn snapshots(&self) -> &CompletionTreeStore {
        &self.snapshots
    }

    pub fn cwd(&self) -> &std::path::Path {
        &self.cwd
    }

    fn open_cache(&self) -> std::result::Result<Cache, CacheError> {
        let options = OpenOptions::new(&self.settings.cache_root)
            .version(RESOURCE_CACHE_VERSION)
            .clock(Rc::clone(&self.clock));
        match options.open(RESOURCE_CACHE_NAME) {
            Err(CacheError::VersionMismatch { found, .. }) => {
                tracing::info!(found = %found, "resource cache version changed; recreating");
                Cache::delete_in(&self.settings.cache_root, RESOURCE_CACHE_NAME)?;
                options.open(RESOURCE_CACHE_NAME)
            }
            other => other,
        }
    }

    /// The shared resource cache, opened (or reopened after a delete) on
    /// demand.
    pub fn cache(&self) -> Result<Cache> {
        let mut slot = self.cache.borrow_mut();
        if let Some(cache) = slot.as_ref() {
            if !cache.is_closed() {
                return Ok(cache.clone());
            }
        }
        let cache = self.open_cache()?;
        *slot = Some(cache.clone());
        Ok(cache)
    }

    /// Closes the resource cache, committing when `commit` is set.
    pub fn finish(&self, commit: bool) -> Result<()> {
        if let Some(cache) = self.cache.borrow_mut().take() {
            cache.close(commit)?;
        }
        Ok(())
    }

    /// Runs one command line (program name excluded) and captures its
    /// output and exit status.
    pub fn invoke<S: AsRef<str>>(&self, argv: &[S]) -> Invocation {
        let argv: Vec<String> = argv.iter().map(|s| s.as_ref().to_string()).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (result, trace) = self.nested(&argv, &mut out, &mut err);

        let mut exit_code = match &result {
            Ok(()) => EXIT_OK,
            Err(e) => {
                self.report(e, &trace, wants_stack_trace(&argv), &mut err);
                e.exit_code()
            }
        };
        if self.depth.get() == 0 {
            if let Err(e) = self.finish(result.is_ok()) {
                self.report(&e, &trace, wants_stack_trace(&argv), &mut err);
                if exit_code == EXIT_OK {
                    exit_code = EXIT_FAILURE;
                }
            }
        }
        Invocation {
            stdout: out,
            stderr: err,
            exit_code,
        }
    }

    /// Tokenizes `line` with shell quoting rules, then invokes it.
    pub fn invoke_line(&self, line: &str) -> Invocation {
        self.invoke(&shell::split(line))
    }

    fn nested(
        &self,
        argv: &[String],
        out: &mut Vec<u8>,
        err: &mut Vec<u8>,
    ) -> (Result<()>, Trace) {
        let mut trace = Trace {
            dotted: self.tree.program().to_string(),
            usage: None,
        };
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        let result = self.execute(argv, out, err, &mut trace);
        self.depth.set(depth);
        (result, trace)
    }

    fn execute(
        &self,
        argv: &[String],
        out: &mut Vec<u8>,
        err: &mut Vec<u8>,
        trace: &mut Trace,
    ) -> Result<()> {
        let (track, tokens) = match argv.first().and_then(|t| ReleaseTrack::from_prefix(t)) {
            Some(track) => (track, &argv[1..]),
            None => (ReleaseTrack::Stable, argv),
        };
        tracing::debug!(track = %track, command = %tokens.join(" "), "invoking");

        let resolved = self.tree.resolve(tokens, track).inspect_err(|e| {
            if let ResolutionError::CommandNotFound { path, .. }
            | ResolutionError::AmbiguousCommand { path, .. } = e
            {
                trace.dotted = path.clone();
            }
        })?;
        trace.dotted = resolved.dotted();
        trace.usage = Some(help::usage_line(&resolved));
        let rest = &tokens[resolved.consumed..];

        let Some(command) = resolved.command else {
            if rest.iter().any(|t| t == "--help" || t == "-h") {
                out.write_all(help::render(&resolved).as_bytes())?;
                return Ok(());
            }
            return Err(ResolutionError::CommandExpected {
                path: resolved.dotted(),
            }
            .into());
        };

        let args = resolved.effective_args();
        let namespace = match ArgParser::new(&args).cancel(&self.cancel).parse(rest)? {
            ParseOutcome::Help => {
                out.write_all(help::render(&resolved).as_bytes())?;
                return Ok(());
            }
            ParseOutcome::Parsed(namespace) => namespace,
        };

        self.cancel.check()?;
        let mut cx = CommandContext::new(self, &namespace, out, err, track, resolved.dotted());
        command.handler.run(&mut cx)
    }

    fn report(&self, error: &Error, trace: &Trace, stack_trace: bool, err: &mut Vec<u8>) {
        tracing::debug!(command = %trace.dotted, error = ?error, "invocation failed");
        let _ = writeln!(err, "ERROR: ({}) {}", trace.dotted, error);
        if let (Error::Argument(_), Some(usage)) = (error, &trace.usage) {
            let _ = writeln!(err, "Usage: {usage}");
        }
        if stack_trace {
            let _ = writeln!(err, "{error:?}");
        }
    }

    /// Completes `line`, the command line up to the cursor (program name
    /// included). Completer and cache failures yield no candidates; with
    /// `--stack-trace` on the line the failure is also written to stderr.
    pub fn complete(&self, line: &str) -> Completion {
        let mut completion = Completion::default();
        match self.try_complete(line) {
            Ok(candidates) => completion.candidates = candidates,
            Err(CompleteError::Snapshot(e)) => {
                tracing::warn!(error = %e, "completion tree unavailable");
                let _ = writeln!(completion.stderr, "{e}");
                completion.exit_code = EXIT_FAILURE;
            }
            Err(CompleteError::Engine(e)) => {
                tracing::warn!(error = %e, "completion failed");
                if wants_stack_trace(&shell::split(line)) {
                    let _ = writeln!(completion.stderr, "{e}");
                }
            }
        }
        if self.depth.get() == 0 {
            if let Err(e) = self.finish(true) {
                tracing::warn!(error = %e, "failed to commit resource cache after completion");
            }
        }
        completion
    }

    fn try_complete(&self, line: &str) -> std::result::Result<Vec<Candidate>, CompleteError> {
        let snapshot = self
            .snapshots
            .load(&self.tree)
            .map_err(CompleteError::Snapshot)?;
        let cache = self.cache().map_err(CompleteError::Engine)?;
        CompletionEngine::new(&snapshot, &self.completers, self, &self.cancel)
            .cache(Some(&cache))
            .cwd(&self.cwd)
            .complete(line)
            .map_err(CompleteError::Engine)
    }
}

enum CompleteError {
    Snapshot(std::io::Error),
    Engine(Error),
}

impl CommandRunner for Context {
    fn run_capture(&self, argv: &[String]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (result, trace) = self.nested(argv, &mut out, &mut err);
        match result {
            Ok(()) => Ok(out),
            Err(e) => {
                tracing::debug!(
                    command = %trace.dotted,
                    stderr = %String::from_utf8_lossy(&err),
                    "nested invocation failed"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .field("program", &self.tree.program())
            .field("completers", &self.completers)
            .finish_non_exhaustive()
    }
}
