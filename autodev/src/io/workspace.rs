//! Writing generated files and artifacts into the project tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::core::path::{safe_relative_path, to_slash};
use crate::core::profile::{is_ignored_dir, is_ignored_file};
use crate::core::types::GeneratedFileSet;
use crate::io::prompt::REPO_SUMMARY_CHARS;
use crate::io::session::AGENT_DIR;

const SUMMARY_FILES_PER_DIR: usize = 8;
const README_HEAD_CHARS: usize = 400;

/// Result of writing a [`GeneratedFileSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

impl WriteReport {
    /// Log lines describing the write, one per file.
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .written
            .iter()
            .map(|path| format!("wrote {path}"))
            .collect();
        lines.extend(self.skipped.iter().map(|reason| format!("skipped {reason}")));
        lines
    }
}

/// Write every file in `set` under `root`, creating parent directories.
///
/// Failures are recorded and skipped; one bad path never aborts the rest.
#[instrument(skip_all, fields(root = %root.display(), files = set.files.len()))]
pub fn write_generated_files(root: &Path, set: &GeneratedFileSet) -> WriteReport {
    let mut report = WriteReport::default();
    for file in &set.files {
        let rel = match safe_relative_path(&file.path) {
            Ok(rel) => rel,
            Err(reason) => {
                warn!(path = %file.path, %reason, "refusing generated path");
                report.skipped.push(format!("{} ({reason})", file.path));
                continue;
            }
        };
        let shown = to_slash(&rel);
        match write_file(&root.join(&rel), &file.content) {
            Ok(()) => {
                debug!(path = %shown, bytes = file.content.len(), "file written");
                report.written.push(shown);
            }
            Err(err) => {
                warn!(path = %shown, error = %format!("{err:#}"), "file write failed");
                report.skipped.push(format!("{shown} ({err:#})"));
            }
        }
    }
    report
}

/// Write an artifact under `<root>/.agent/` and return its path.
pub fn write_artifact(root: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = root.join(AGENT_DIR).join(name);
    let mut body = contents.trim_end().to_string();
    body.push('\n');
    write_file(&path, &body)?;
    debug!(path = %path.display(), "artifact written");
    Ok(path)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

/// Short textual overview of the repository for design prompts.
///
/// Lists the root and its immediate subdirectories with a handful of file
/// names each, then the head of `README.md` when present.
pub fn summarize_repo(root: &Path) -> String {
    let mut parts = Vec::new();
    let dirs = WalkDir::new(root)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_ignored_dir(&entry.file_name().to_string_lossy())
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir());
    for dir in dirs {
        let rel = dir
            .path()
            .strip_prefix(root)
            .map(to_slash)
            .unwrap_or_default();
        let label = if rel.is_empty() { ".".to_string() } else { rel };
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .filter(|name| !is_ignored_file(name))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names.truncate(SUMMARY_FILES_PER_DIR);
        parts.push(format!("[{label}] files: {}", names.join(", ")));
    }

    if let Ok(readme) = fs::read_to_string(root.join("README.md")) {
        let head: String = readme.chars().take(README_HEAD_CHARS).collect();
        parts.push(format!("README.md (head):\n{head}"));
    }

    let summary = parts.join("\n");
    summary.chars().take(REPO_SUMMARY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GeneratedFile;

    #[test]
    fn writes_nested_files_and_skips_unsafe_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let set = GeneratedFileSet {
            files: vec![
                GeneratedFile::new("src/app/main.py", "print('hi')\n"),
                GeneratedFile::new("../escape.txt", "nope"),
                GeneratedFile::new("/etc/abs.txt", "nope"),
            ],
            summary: String::new(),
        };
        let report = write_generated_files(temp.path(), &set);
        assert_eq!(report.written, vec!["src/app/main.py".to_string()]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(
            fs::read_to_string(temp.path().join("src/app/main.py")).expect("read"),
            "print('hi')\n"
        );
        assert!(report.log_lines()[0].starts_with("wrote "));
    }

    #[test]
    fn generated_files_never_touch_git_or_session_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let set = GeneratedFileSet {
            files: vec![
                GeneratedFile::new(".git/hooks/pre-commit", "#!/bin/sh\n"),
                GeneratedFile::new(".agent/state.json", "{}"),
                GeneratedFile::new("app.py", "print(1)\n"),
            ],
            summary: String::new(),
        };
        let report = write_generated_files(temp.path(), &set);
        assert_eq!(report.written, vec!["app.py".to_string()]);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped[0].contains("reserved directory .git"));
        assert!(!temp.path().join(".git/hooks/pre-commit").exists());
        assert!(!temp.path().join(".agent/state.json").exists());
    }

    #[test]
    fn artifacts_land_in_agent_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_artifact(temp.path(), "PRD.md", "# PRD\n\n\n").expect("artifact");
        assert_eq!(path, temp.path().join(".agent/PRD.md"));
        assert_eq!(fs::read_to_string(path).expect("read"), "# PRD\n");
    }

    #[test]
    fn summary_lists_shallow_dirs_and_readme_head() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src/deep/deeper")).expect("mkdir");
        fs::create_dir_all(root.join("node_modules")).expect("mkdir");
        fs::write(root.join("src/lib.rs"), "").expect("write");
        fs::write(root.join("src/deep/deeper/x.rs"), "").expect("write");
        fs::write(root.join("node_modules/junk.js"), "").expect("write");
        fs::write(root.join("README.md"), "x".repeat(1000)).expect("write");

        let summary = summarize_repo(root);
        assert!(summary.contains("[.] files: README.md"));
        assert!(summary.contains("[src] files: lib.rs"));
        assert!(!summary.contains("deeper"));
        assert!(!summary.contains("node_modules"));
        let head = summary.split("README.md (head):\n").nth(1).expect("readme");
        assert_eq!(head.len(), README_HEAD_CHARS);
    }
}
