//! # cmdtree
//!
//! Hierarchical command dispatcher: a tree of command groups and leaf
//! commands, an argument parser producing typed namespaces, release-track
//! gating (`pre-release`, `experimental`), shell completion through the
//! argcomplete environment protocol, and a persistent, versioned cache of
//! completion candidates.
//!
//! ## Layout
//!
//! - [`tree`] - command tree, release tracks, argument schemas, usage text
//! - [`parser`] - token loop producing a [`parser::Namespace`]
//! - [`cache`] - persistent table cache with expiry and glob selection
//! - [`snapshot`] - serialized completion tree store
//! - [`completion`] - completion engine, completers and shell protocol
//! - [`driver`] - invocation context, handlers and prompting
//! - [`surface`] - the built-in `compute` and `meta` command surface
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cmdtree::config::Settings;
//! use cmdtree::surface;
//!
//! let ctx = surface::context(Settings::from_env()).expect("context");
//! let argv: Vec<String> = vec!["compute".into(), "zones".into(), "list".into()];
//! let invocation = ctx.invoke(&argv);
//! print!("{}", String::from_utf8_lossy(&invocation.stdout));
//! ```

pub mod cache;
pub mod cancel;
pub mod clock;
pub mod completion;
pub mod config;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod fs_utils;
pub mod logging;
pub mod parser;
pub mod service;
pub mod shell;
pub mod snapshot;
pub mod surface;
pub mod tree;

pub use error::{Error, Result, RuntimeError};
