//! Project profile derived from a file listing.
//!
//! Classification is pure: callers supply relative `/`-separated paths and a
//! content reader for framework signatures.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::language::{Language, language_for_path};

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".agent",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "venv",
    "env",
    ".venv",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    ".vs",
    ".vscode",
    ".idea",
    ".gradle",
    ".maven",
];

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitignore"];

/// Exact config file names and the build tool they imply.
const CONFIG_FILES: &[(&str, &str)] = &[
    ("requirements.txt", "pip"),
    ("pyproject.toml", "poetry/setuptools"),
    ("setup.py", "setuptools"),
    ("Pipfile", "pipenv"),
    ("poetry.lock", "poetry"),
    ("package.json", "npm/yarn"),
    ("yarn.lock", "yarn"),
    ("package-lock.json", "npm"),
    ("tsconfig.json", "tsc"),
    ("webpack.config.js", "webpack"),
    ("vite.config.js", "vite"),
    ("next.config.js", "next.js"),
    ("global.json", "dotnet"),
    ("pom.xml", "maven"),
    ("build.gradle", "gradle"),
    ("build.gradle.kts", "gradle"),
    ("go.mod", "go modules"),
    ("go.sum", "go modules"),
    ("Cargo.toml", "cargo"),
    ("Cargo.lock", "cargo"),
    ("composer.json", "composer"),
    ("composer.lock", "composer"),
    ("Gemfile", "bundler"),
    ("Gemfile.lock", "bundler"),
    ("Dockerfile", "docker"),
    ("docker-compose.yml", "docker-compose"),
    ("Makefile", "make"),
    ("CMakeLists.txt", "cmake"),
];

/// Config file suffixes and the build tool they imply.
const CONFIG_SUFFIXES: &[(&str, &str)] = &[
    (".csproj", "dotnet"),
    (".sln", "dotnet"),
    (".fsproj", "dotnet"),
    (".vbproj", "dotnet"),
];

const ENTRY_POINTS: &[&str] = &[
    "main.py",
    "app.py",
    "server.py",
    "run.py",
    "__main__.py",
    "index.js",
    "server.js",
    "app.js",
    "main.js",
    "index.ts",
    "server.ts",
    "app.ts",
    "main.ts",
    "Program.cs",
    "Startup.cs",
    "Main.cs",
    "Main.java",
    "Application.java",
    "main.go",
    "server.go",
    "app.go",
    "main.rs",
    "lib.rs",
    "server.rs",
    "index.php",
    "app.php",
    "server.php",
];

/// Substrings of `/<relative path>` that mark a test file.
const TEST_MARKERS: &[&str] = &[
    "test_",
    "_test.",
    ".test.",
    ".spec.",
    "/test/",
    "/tests/",
    "__tests__/",
    "Test.cs",
    "Tests.cs",
    "Test.java",
];

/// Framework signatures, matched as substrings in primary-language sources.
const FRAMEWORK_SIGNATURES: &[(Language, &str, &[&str])] = &[
    (Language::Python, "fastapi", &["from fastapi", "import fastapi", "FastAPI()"]),
    (Language::Python, "flask", &["from flask", "import flask", "Flask(__name__)"]),
    (Language::Python, "django", &["django.", "DJANGO_SETTINGS_MODULE", "manage.py"]),
    (Language::Python, "pytest", &["import pytest", "def test_", "@pytest."]),
    (Language::Javascript, "react", &["import React", "from \"react\"", "React.Component"]),
    (Language::Javascript, "vue", &["import Vue", "from \"vue\"", "<template>"]),
    (Language::Javascript, "angular", &["@angular/", "@Component", "@Injectable"]),
    (Language::Javascript, "express", &["require(\"express\")", "import express", "express()"]),
    (Language::Javascript, "next", &["next/", "from \"next\"", "getServerSideProps"]),
    (
        Language::Csharp,
        "asp.net",
        &["using Microsoft.AspNetCore", "[ApiController]", "WebApplication."],
    ),
    (Language::Csharp, "blazor", &["@page", "@code", "ComponentBase"]),
    (Language::Csharp, "mvc", &["Controller", "ActionResult", "ViewResult"]),
    (Language::Java, "spring", &["@SpringBootApplication", "@RestController", "@Service"]),
    (Language::Java, "springboot", &["@SpringBootApplication", "SpringApplication.run"]),
];

/// Derived description of a project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectProfile {
    pub primary_language: Language,
    pub secondary_languages: BTreeSet<Language>,
    pub frameworks: BTreeSet<String>,
    pub build_tools: BTreeSet<String>,
    pub source_files: BTreeSet<String>,
    pub test_files: BTreeSet<String>,
    pub entry_points: BTreeSet<String>,
    pub config_files: BTreeSet<String>,
}

impl Default for ProjectProfile {
    fn default() -> Self {
        Self {
            primary_language: Language::Unknown,
            secondary_languages: BTreeSet::new(),
            frameworks: BTreeSet::new(),
            build_tools: BTreeSet::new(),
            source_files: BTreeSet::new(),
            test_files: BTreeSet::new(),
            entry_points: BTreeSet::new(),
            config_files: BTreeSet::new(),
        }
    }
}

impl ProjectProfile {
    pub fn has_tests(&self) -> bool {
        !self.test_files.is_empty()
    }

    /// Compact one-line description for logs.
    pub fn summary_line(&self) -> String {
        format!(
            "language={} sources={} tests={} frameworks=[{}] build_tools=[{}]",
            self.primary_language,
            self.source_files.len(),
            self.test_files.len(),
            join(&self.frameworks),
            join(&self.build_tools)
        )
    }
}

fn join(items: &BTreeSet<String>) -> String {
    items.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// True if a file name is excluded from analysis.
pub fn is_ignored_file(name: &str) -> bool {
    IGNORED_FILES.contains(&name) || name.starts_with(".env")
}

/// True if a directory name is pruned from the walk.
pub fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Build a profile from relative file paths.
///
/// `read` returns file contents for framework detection; `None` skips the file.
pub fn classify<I, S, R>(paths: I, mut read: R) -> ProjectProfile
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    R: FnMut(&str) -> Option<String>,
{
    let mut profile = ProjectProfile::default();
    let mut counts: BTreeMap<Language, usize> = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        let name = basename(path);
        if is_ignored_file(name) {
            continue;
        }

        if let Some(language) = language_for_path(path) {
            *counts.entry(language).or_default() += 1;
            profile.source_files.insert(path.to_string());
        }

        if let Some((_, tool)) = CONFIG_FILES.iter().find(|(file, _)| *file == name) {
            profile.config_files.insert(path.to_string());
            profile.build_tools.insert((*tool).to_string());
        }
        if let Some((_, tool)) = CONFIG_SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
        {
            profile.config_files.insert(path.to_string());
            profile.build_tools.insert((*tool).to_string());
        }

        if ENTRY_POINTS.contains(&name) {
            profile.entry_points.insert(path.to_string());
        }

        let anchored = format!("/{path}");
        if TEST_MARKERS.iter().any(|marker| anchored.contains(marker)) {
            profile.test_files.insert(path.to_string());
        }
    }

    // Iteration follows declaration order, so the first maximum wins ties.
    let mut best: Option<(Language, usize)> = None;
    for (language, count) in &counts {
        if best.is_none_or(|(_, top)| *count > top) {
            best = Some((*language, *count));
        }
    }
    if let Some((primary, _)) = best {
        profile.primary_language = primary;
        profile.secondary_languages = counts.keys().copied().filter(|l| *l != primary).collect();
    }

    let language = profile.primary_language;
    if FRAMEWORK_SIGNATURES.iter().any(|(lang, _, _)| *lang == language) {
        let extensions = language.source_extensions();
        let candidates: Vec<String> = profile
            .source_files
            .iter()
            .filter(|path| {
                let lower = path.to_ascii_lowercase();
                extensions.iter().any(|ext| lower.ends_with(ext))
            })
            .cloned()
            .collect();
        for path in candidates {
            let Some(content) = read(&path) else {
                continue;
            };
            for (_, framework, needles) in FRAMEWORK_SIGNATURES
                .iter()
                .filter(|(lang, _, _)| *lang == language)
            {
                if needles.iter().any(|needle| content.contains(needle)) {
                    profile.frameworks.insert((*framework).to_string());
                }
            }
        }
    }

    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_content(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn go_only_project_without_tests() {
        let profile = classify(["main.go", "handlers.go", "go.mod"], no_content);
        assert_eq!(profile.primary_language, Language::Go);
        assert!(profile.secondary_languages.is_empty());
        assert!(!profile.has_tests());
        assert!(profile.entry_points.contains("main.go"));
        assert!(profile.build_tools.contains("go modules"));
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let profile = classify(["a.rs", "b.py"], no_content);
        assert_eq!(profile.primary_language, Language::Python);
        assert_eq!(
            profile.secondary_languages.iter().copied().collect::<Vec<_>>(),
            vec![Language::Rust]
        );
    }

    #[test]
    fn test_markers_match_top_level_directories() {
        let profile = classify(
            ["tests/api.py", "src/app.py", "web/Button.spec.ts", "Foo/BarTests.cs"],
            no_content,
        );
        let tests: Vec<&str> = profile.test_files.iter().map(String::as_str).collect();
        assert_eq!(tests, vec!["Foo/BarTests.cs", "tests/api.py", "web/Button.spec.ts"]);
    }

    #[test]
    fn suffix_config_files_are_detected() {
        let profile = classify(["Api/Api.csproj", "Api/Program.cs"], no_content);
        assert!(profile.config_files.contains("Api/Api.csproj"));
        assert!(profile.build_tools.contains("dotnet"));
        assert_eq!(profile.primary_language, Language::Csharp);
    }

    #[test]
    fn frameworks_come_from_primary_language_sources() {
        let profile = classify(["app.py", "index.js"], |path| match path {
            "app.py" => Some("from fastapi import FastAPI\napp = FastAPI()".to_string()),
            "index.js" => Some("const express = require(\"express\")".to_string()),
            _ => None,
        });
        assert_eq!(profile.primary_language, Language::Python);
        assert_eq!(
            profile.frameworks.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["fastapi"]
        );
    }

    #[test]
    fn ignored_names_are_skipped() {
        let profile = classify([".env.local", ".DS_Store", "x.py"], no_content);
        assert_eq!(profile.source_files.len(), 1);
        assert!(is_ignored_dir("node_modules"));
        assert!(is_ignored_file(".env"));
    }
}
