//! argcomplete-style environment protocol.
//!
//! The shell hook sets `_ARGCOMPLETE=1`, the line being edited in
//! `COMP_LINE`, the cursor byte offset in `COMP_POINT` and optionally the
//! record separator in `_ARGCOMPLETE_IFS` (vertical tab by default). The
//! program answers with candidates joined by that separator on stdout.

use std::io::{self, Write};

use super::candidate::Candidate;

pub const ENV_ACTIVATE: &str = "_ARGCOMPLETE";
pub const ENV_LINE: &str = "COMP_LINE";
pub const ENV_POINT: &str = "COMP_POINT";
pub const ENV_IFS: &str = "_ARGCOMPLETE_IFS";

pub const DEFAULT_IFS: &str = "\u{0b}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEnv {
    pub line: String,
    /// Byte offset of the cursor, clamped to the line.
    pub point: usize,
    pub ifs: String,
}

impl CompletionEnv {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `None` unless completion mode is active.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(ENV_ACTIVATE).filter(|v| !v.is_empty())?;
        let line = lookup(ENV_LINE).unwrap_or_default();
        let point = lookup(ENV_POINT)
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(line.len());
        let ifs = lookup(ENV_IFS)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_IFS.to_string());
        Some(Self {
            point: clamp_to_boundary(&line, point),
            line,
            ifs,
        })
    }

    /// The line up to the cursor.
    pub fn before_cursor(&self) -> &str {
        &self.line[..self.point]
    }
}

fn clamp_to_boundary(line: &str, point: usize) -> usize {
    let mut point = point.min(line.len());
    while !line.is_char_boundary(point) {
        point -= 1;
    }
    point
}

pub fn write_candidates<W: Write>(out: &mut W, candidates: &[Candidate], ifs: &str) -> io::Result<()> {
    let joined = candidates
        .iter()
        .map(|c| c.cell.as_str())
        .collect::<Vec<_>>()
        .join(ifs);
    out.write_all(joined.as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Option<CompletionEnv> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CompletionEnv::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_inactive_without_flag() {
        assert!(env(&[(ENV_LINE, "cmdt ")]).is_none());
    }

    #[test]
    fn test_point_defaults_and_clamps() {
        let e = env(&[(ENV_ACTIVATE, "1"), (ENV_LINE, "cmdt comp")]).unwrap();
        assert_eq!(e.point, 9);
        assert_eq!(e.ifs, DEFAULT_IFS);

        let e = env(&[(ENV_ACTIVATE, "1"), (ENV_LINE, "cmdt comp"), (ENV_POINT, "7")]).unwrap();
        assert_eq!(e.before_cursor(), "cmdt co");

        let e = env(&[(ENV_ACTIVATE, "1"), (ENV_LINE, "cmdt"), (ENV_POINT, "99")]).unwrap();
        assert_eq!(e.before_cursor(), "cmdt");
    }

    #[test]
    fn test_write_joins_with_ifs() {
        let mut out = Vec::new();
        let candidates = vec![Candidate::new("a"), Candidate::new("b")];
        write_candidates(&mut out, &candidates, "\n").unwrap();
        assert_eq!(out, b"a\nb");
    }
}
