//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use cmdtree::config::Settings;
use cmdtree::driver::{Context, ScriptedPrompter};
use cmdtree::surface;
use tempfile::TempDir;

/// Opts into tests that are skipped by default.
pub const ENV_RUN_SKIPPED: &str = "CMDT_TEST_RUN_SKIPPED";
/// Opts into tests that sleep on the real clock.
pub const ENV_LONGRUNNING: &str = "CMDT_TEST_LONGRUNNING";

fn toggle(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

pub fn run_skipped() -> bool {
    toggle(ENV_RUN_SKIPPED)
}

pub fn longrunning() -> bool {
    toggle(ENV_LONGRUNNING)
}

/// A sample-surface context rooted in `tmp`, answering prompts from
/// `answers`.
pub fn context(tmp: &TempDir, answers: &[&str]) -> Context {
    let settings = Settings::for_root(tmp.path().join("cache"));
    surface::context(settings)
        .expect("sample context")
        .with_prompter(Rc::new(ScriptedPrompter::new(answers.iter().copied())))
        .with_cwd(tmp.path())
}
