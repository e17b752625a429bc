//! Crate-wide error type and exit codes.
//!
//! Every component owns a typed error enum (`ArgumentError`, `CacheError`,
//! `ResolutionError`, `RuntimeError`); they meet here so the driver can map
//! any failure to an exit status without inspecting strings.

use thiserror::Error;

use crate::cache::CacheError;
use crate::parser::ArgumentError;
use crate::tree::ResolutionError;

/// Successful invocation.
pub const EXIT_OK: i32 = 0;
/// Generic failure (remote errors, I/O, unclassified handler errors).
pub const EXIT_FAILURE: i32 = 1;
/// Argument, parse or command resolution error.
pub const EXIT_ARGUMENT: i32 = 2;
/// A prompt was required in a non-interactive session.
pub const EXIT_PROMPT_REQUIRED: i32 = 3;
/// The caller cancelled the invocation.
pub const EXIT_CANCELLED: i32 = 130;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised while a command runs (outside argument parsing).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A collaborator answered with a non-2xx status.
    #[error("HTTPError {status}: {message}")]
    Remote { status: u16, message: String },

    /// A handler needed an answer but the session cannot prompt.
    #[error("This command requires a response to [{prompt}] but the session is not interactive. Re-run with --quiet to accept the default.")]
    PromptRequired { prompt: String },

    #[error("Operation cancelled.")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A handler failure carrying its own exit status.
    #[error("{message}")]
    Failed { code: i32, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for handler-declared failures.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Error::Failed {
            code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Argument(_) | Error::Resolution(_) => EXIT_ARGUMENT,
            Error::Runtime(RuntimeError::PromptRequired { .. }) => EXIT_PROMPT_REQUIRED,
            Error::Runtime(RuntimeError::Cancelled) => EXIT_CANCELLED,
            Error::Failed { code, .. } => *code,
            _ => EXIT_FAILURE,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Runtime(RuntimeError::Cancelled))
    }
}

impl From<RuntimeError> for std::io::Error {
    fn from(err: RuntimeError) -> Self {
        std::io::Error::other(err.to_string())
    }
}
