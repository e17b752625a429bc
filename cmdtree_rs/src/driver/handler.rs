use std::io::Write;

use super::Context;
use super::prompt::parse_answer;
use crate::cache::Cache;
use crate::error::{Result, RuntimeError};
use crate::parser::Namespace;
use crate::service::ResourceService;
use crate::tree::ReleaseTrack;

/// What a command does once its arguments parsed.
pub trait Handler {
    fn run(&self, cx: &mut CommandContext<'_>) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut CommandContext<'_>) -> Result<()>,
{
    fn run(&self, cx: &mut CommandContext<'_>) -> Result<()> {
        self(cx)
    }
}

/// Per-invocation view handed to a [`Handler`]: parsed arguments, captured
/// output streams and the shared [`Context`].
pub struct CommandContext<'a> {
    pub args: &'a Namespace,
    pub out: &'a mut Vec<u8>,
    pub err: &'a mut Vec<u8>,
    pub track: ReleaseTrack,
    ctx: &'a Context,
    path: String,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        ctx: &'a Context,
        args: &'a Namespace,
        out: &'a mut Vec<u8>,
        err: &'a mut Vec<u8>,
        track: ReleaseTrack,
        path: String,
    ) -> Self {
        Self {
            args,
            out,
            err,
            track,
            ctx,
            path,
        }
    }

    pub fn context(&self) -> &'a Context {
        self.ctx
    }

    /// Dotted command path, `cmdt.compute.instances.list`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn quiet(&self) -> bool {
        self.args.flag("quiet")
    }

    /// `--project`, or the service's default project.
    pub fn project(&self) -> String {
        self.args
            .str("project")
            .map(str::to_string)
            .unwrap_or_else(|| self.ctx.service().default_project())
    }

    /// Shared resource cache, opened on first use.
    pub fn cache(&self) -> Result<Cache> {
        self.ctx.cache()
    }

    /// Remote call guarded by the cancellation token.
    pub fn remote<T>(
        &self,
        call: impl FnOnce(&dyn ResourceService) -> std::result::Result<T, RuntimeError>,
    ) -> Result<T> {
        self.ctx.cancel_token().check()?;
        Ok(call(self.ctx.service())?)
    }

    pub fn print(&mut self, line: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", line.as_ref())?;
        Ok(())
    }

    pub fn status(&mut self, line: impl AsRef<str>) -> Result<()> {
        writeln!(self.err, "{}", line.as_ref())?;
        Ok(())
    }

    /// Asks `message (Y/n)?`. `--quiet` accepts the default without asking;
    /// a session that cannot prompt fails with `PromptRequired`.
    pub fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        if self.quiet() {
            return Ok(default);
        }
        let prompter = self.ctx.prompter();
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        let prompt = format!("{message}\n\nDo you want to continue {hint}?  ");
        if !prompter.is_interactive() {
            return Err(RuntimeError::PromptRequired {
                prompt: message.to_string(),
            }
            .into());
        }
        loop {
            let Some(answer) = prompter.read_line(&prompt)? else {
                return Ok(default);
            };
            if let Some(yes) = parse_answer(&answer, default) {
                return Ok(yes);
            }
            writeln!(self.err, "Please enter 'y' or 'n':")?;
        }
    }
}
