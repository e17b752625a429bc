use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{Result, RuntimeError};

/// Source of answers for handlers that need user input.
pub trait Prompter {
    /// Whether confirmations may block waiting for the user.
    fn is_interactive(&self) -> bool;

    /// Shows `prompt` and reads one line without its newline; `None` at end
    /// of input.
    fn read_line(&self, prompt: &str) -> Result<Option<String>>;
}

/// Never prompts; every read fails with `PromptRequired`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        Err(RuntimeError::PromptRequired {
            prompt: prompt.trim().to_string(),
        }
        .into())
    }
}

/// Prompts on stderr and reads stdin. Interactive only when stdin is a
/// terminal; reads still work on piped input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        let mut stderr = io::stderr();
        stderr.write_all(prompt.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Replays canned answers and records the prompts it was shown.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn is_interactive(&self) -> bool {
        true
    }

    fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answers.borrow_mut().pop_front())
    }
}

/// `y`/`yes` or `n`/`no`, case-insensitive; empty means `default`.
pub fn parse_answer(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
