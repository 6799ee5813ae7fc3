//! Filesystem side of project analysis.

use std::fs;
use std::path::Path;

use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::core::path::to_slash;
use crate::core::profile::{ProjectProfile, classify, is_ignored_dir, is_ignored_file};

/// Files larger than this are not scanned for framework signatures.
const MAX_SIGNATURE_BYTES: u64 = 512 * 1024;

fn keep_entry(entry: &DirEntry) -> bool {
    // The root itself is always walked, whatever its name.
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() {
        !is_ignored_dir(&name)
    } else {
        !is_ignored_file(&name)
    }
}

/// List project files as sorted relative `/`-separated paths.
///
/// Ignored directories are pruned; unreadable entries are skipped.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(to_slash)
        })
        .filter(|rel| !rel.is_empty())
        .collect();
    files.sort();
    files
}

/// Analyze `root` into a [`ProjectProfile`]. Never fails; a missing or
/// unreadable directory yields an empty profile.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn analyze(root: &Path) -> ProjectProfile {
    let files = list_files(root);
    let profile = classify(&files, |rel| {
        let path = root.join(rel);
        let size = fs::metadata(&path).ok()?.len();
        if size > MAX_SIGNATURE_BYTES {
            return None;
        }
        fs::read_to_string(path).ok()
    });
    debug!(files = files.len(), summary = %profile.summary_line(), "project analyzed");
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::language::Language;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn pruned_directories_do_not_affect_profile() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write(root, "main.go", "package main");
        let before = analyze(root);

        write(root, "node_modules/lib/index.js", "module.exports = 1");
        write(root, ".git/hooks/pre-commit.py", "print(1)");
        write(root, ".agent/PRD.md", "# PRD");
        write(root, "target/debug/build.rs", "fn main() {}");
        let after = analyze(root);

        assert_eq!(before, after);
        assert_eq!(after.primary_language, Language::Go);
    }

    #[test]
    fn reads_sources_for_framework_signatures() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write(root, "app.py", "from flask import Flask\napp = Flask(__name__)\n");
        write(root, "tests/test_app.py", "import pytest\n");
        let profile = analyze(root);
        assert!(profile.frameworks.contains("flask"));
        assert!(profile.frameworks.contains("pytest"));
        assert!(profile.has_tests());
    }

    #[test]
    fn missing_directory_yields_empty_profile() {
        let temp = tempfile::tempdir().expect("tempdir");
        let profile = analyze(&temp.path().join("nope"));
        assert_eq!(profile, ProjectProfile::default());
    }
}
