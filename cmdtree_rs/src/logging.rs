//! Diagnostic logging.
//!
//! Logs go to stderr; stdout belongs to command output and completion
//! candidates.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `filter` is a `tracing` directive such as
/// `warn` or `cmdtree::cache=debug`; an unparsable directive falls back to
/// `warn`. Calling this twice is harmless.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
