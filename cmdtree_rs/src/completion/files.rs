use std::fs;
use std::path::Path;

use super::candidate::Candidate;
use super::completer::{Completer, CompletionRequest};

/// Completes filesystem paths relative to the request's directory.
/// Directories get a trailing `/`; dotfiles only show for a `.` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCompleter;

impl Completer for FileCompleter {
    fn complete(&self, request: &CompletionRequest<'_>) -> crate::Result<Vec<Candidate>> {
        let prefix = request.prefix;
        let (dir_part, name_part) = match prefix.rfind('/') {
            Some(idx) => prefix.split_at(idx + 1),
            None => ("", prefix),
        };
        let dir = if Path::new(dir_part).is_absolute() {
            Path::new(dir_part).to_path_buf()
        } else {
            request.cwd.join(dir_part)
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "cannot list directory");
                return Ok(Vec::new());
            }
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(name_part) {
                continue;
            }
            if name.starts_with('.') && !name_part.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let suffix = if is_dir { "/" } else { "" };
            found.push(Candidate::new(format!("{dir_part}{name}{suffix}")));
        }
        Ok(found)
    }

    fn describe(&self) -> String {
        "files in the current directory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::completion::CommandRunner;
    use crate::parser::Namespace;
    use tempfile::TempDir;

    struct NoRunner;

    impl CommandRunner for NoRunner {
        fn run_capture(&self, _argv: &[String]) -> crate::Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn complete(cwd: &Path, prefix: &str) -> Vec<String> {
        let namespace = Namespace::new();
        let cancel = CancelToken::new();
        let request = CompletionRequest::new(prefix, &namespace, &NoRunner, &cancel, cwd);
        let mut cells: Vec<String> = FileCompleter
            .complete(&request)
            .unwrap()
            .into_iter()
            .map(|c| c.cell)
            .collect();
        cells.sort();
        cells
    }

    #[test]
    fn test_prefix_filters_entries() {
        let tmp = TempDir::new().expect("create temp dir");
        for name in ["abc.dat", "x.dat", "xyz.dat", ".xhidden"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        assert_eq!(complete(tmp.path(), "x"), vec!["x.dat", "xyz.dat"]);
        assert_eq!(complete(tmp.path(), ".x"), vec![".xhidden"]);
    }

    #[test]
    fn test_directories_get_trailing_slash() {
        let tmp = TempDir::new().expect("create temp dir");
        fs::create_dir_all(tmp.path().join("conf/nested")).unwrap();
        fs::write(tmp.path().join("conf/app.json"), b"{}").unwrap();
        assert_eq!(complete(tmp.path(), "co"), vec!["conf/"]);
        assert_eq!(
            complete(tmp.path(), "conf/"),
            vec!["conf/app.json", "conf/nested/"]
        );
        assert!(complete(tmp.path(), "missing/").is_empty());
    }
}
