//! Validation of relative paths produced by generation.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Why a generated path was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    Absolute,
    EscapesRoot,
    Reserved(String),
}

/// Top-level directories generated files may never write into.
pub const RESERVED_DIRS: [&str; 2] = [".git", ".agent"];

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::Empty => f.write_str("path is empty"),
            PathRejection::Absolute => f.write_str("path is absolute"),
            PathRejection::EscapesRoot => f.write_str("path escapes the project root"),
            PathRejection::Reserved(dir) => write!(f, "path is inside reserved directory {dir}"),
        }
    }
}

/// Normalize a `/`-separated relative path, rejecting anything that could
/// land outside the project root.
///
/// `.` segments are dropped; `..` is refused outright rather than resolved.
/// Paths under [`RESERVED_DIRS`] are refused.
pub fn safe_relative_path(raw: &str) -> Result<PathBuf, PathRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathRejection::Empty);
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(PathRejection::Absolute);
    }
    let mut out = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(PathRejection::EscapesRoot),
            Component::RootDir | Component::Prefix(_) => return Err(PathRejection::Absolute),
        }
    }
    let Some(first) = out.components().next() else {
        return Err(PathRejection::Empty);
    };
    let first = first.as_os_str().to_string_lossy();
    if let Some(dir) = RESERVED_DIRS.iter().find(|dir| first.eq_ignore_ascii_case(dir)) {
        return Err(PathRejection::Reserved((*dir).to_string()));
    }
    Ok(out)
}

/// Render a relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
