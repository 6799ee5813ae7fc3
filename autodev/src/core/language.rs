//! Language tags and the static tables that map files and requests onto them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Programming language detected for a project.
///
/// Declaration order is significant: it breaks ties when two languages have
/// the same file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Csharp,
    Java,
    Go,
    Rust,
    Php,
    Ruby,
    Unknown,
}

impl Language {
    /// Every concrete language, in tie-break order.
    pub const KNOWN: [Language; 9] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Csharp,
        Language::Java,
        Language::Go,
        Language::Rust,
        Language::Php,
        Language::Ruby,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Csharp => "csharp",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Language {
        let raw = raw.trim().to_ascii_lowercase();
        Language::KNOWN
            .into_iter()
            .find(|lang| lang.as_str() == raw)
            .unwrap_or(Language::Unknown)
    }

    /// Source extensions (lowercase, with dot) owned by this language.
    pub fn source_extensions(self) -> &'static [&'static str] {
        match self {
            Language::Python => &[".py"],
            Language::Javascript => &[".js", ".mjs", ".jsx"],
            Language::Typescript => &[".ts", ".tsx"],
            Language::Csharp => &[".cs"],
            Language::Java => &[".java"],
            Language::Go => &[".go"],
            Language::Rust => &[".rs"],
            Language::Php => &[".php"],
            Language::Ruby => &[".rb"],
            Language::Unknown => &[],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a file name to a language by its extension.
pub fn language_for_path(path: &str) -> Option<Language> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    let ext = name[dot..].to_ascii_lowercase();
    Language::KNOWN
        .into_iter()
        .find(|lang| lang.source_extensions().contains(&ext.as_str()))
}

struct RequestKeywords {
    language: Language,
    /// Matched with double weight.
    names: &'static [&'static str],
    related: &'static [&'static str],
}

const REQUEST_KEYWORDS: &[RequestKeywords] = &[
    RequestKeywords {
        language: Language::Python,
        names: &["python"],
        related: &["django", "flask", "fastapi", "pytest", "pip"],
    },
    RequestKeywords {
        language: Language::Javascript,
        names: &["javascript", "js", "nodejs", "node.js"],
        related: &["node", "npm", "yarn", "react", "vue", "express"],
    },
    RequestKeywords {
        language: Language::Typescript,
        names: &["typescript", "ts"],
        related: &["angular", "nest", "nestjs"],
    },
    RequestKeywords {
        language: Language::Csharp,
        names: &["c#", "csharp", ".net", "dotnet"],
        related: &["asp.net", "blazor", "mvc"],
    },
    RequestKeywords {
        language: Language::Java,
        names: &["java"],
        related: &["spring", "maven", "gradle", "springboot"],
    },
    RequestKeywords {
        language: Language::Go,
        names: &["go", "golang"],
        related: &["gin", "gorilla", "echo"],
    },
    RequestKeywords {
        language: Language::Rust,
        names: &["rust"],
        related: &["cargo", "actix", "warp", "tokio", "axum"],
    },
    RequestKeywords {
        language: Language::Php,
        names: &["php"],
        related: &["laravel", "symfony", "composer"],
    },
    RequestKeywords {
        language: Language::Ruby,
        names: &["ruby"],
        related: &["rails", "sinatra", "gem"],
    },
];

static KEYWORD_PATTERNS: LazyLock<Vec<(Language, u32, Regex)>> = LazyLock::new(|| {
    let mut patterns = Vec::new();
    for entry in REQUEST_KEYWORDS {
        let weighted = entry
            .names
            .iter()
            .map(|kw| (3, *kw))
            .chain(entry.related.iter().map(|kw| (1, *kw)));
        for (weight, keyword) in weighted {
            // `\b` does not anchor next to punctuation such as `#` or a leading `.`.
            let escaped = regex::escape(keyword);
            let pattern = format!(r"(?:^|[^a-z0-9_]){escaped}(?:$|[^a-z0-9_])");
            let re = Regex::new(&pattern).expect("keyword pattern should compile");
            patterns.push((entry.language, weight, re));
        }
    }
    patterns
});

/// Infer the language a request asks for from weighted keyword matches.
///
/// Returns `None` when no keyword matches. Ties go to the earlier language.
pub fn detect_language_from_request(request: &str) -> Option<Language> {
    let lowered = request.to_lowercase();
    let mut scores = [0u32; Language::KNOWN.len()];
    for (language, weight, re) in KEYWORD_PATTERNS.iter() {
        if re.is_match(&lowered) {
            let idx = Language::KNOWN
                .iter()
                .position(|known| known == language)
                .unwrap_or(0);
            scores[idx] += weight;
        }
    }
    let mut best: Option<(Language, u32)> = None;
    for (idx, score) in scores.iter().enumerate() {
        if *score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if top >= *score => {}
            _ => best = Some((Language::KNOWN[idx], *score)),
        }
    }
    best.map(|(language, _)| language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extensions_case_insensitively() {
        assert_eq!(language_for_path("src/App.TSX"), Some(Language::Typescript));
        assert_eq!(language_for_path("main.go"), Some(Language::Go));
        assert_eq!(language_for_path("README.md"), None);
        assert_eq!(language_for_path(".py"), None);
    }

    #[test]
    fn parse_round_trips_known_names() {
        for lang in Language::KNOWN {
            assert_eq!(Language::parse(lang.as_str()), lang);
        }
        assert_eq!(Language::parse("cobol"), Language::Unknown);
    }

    #[test]
    fn detects_language_from_request_keywords() {
        assert_eq!(
            detect_language_from_request("build a REST API in Go with gin"),
            Some(Language::Go)
        );
        assert_eq!(
            detect_language_from_request("A C# service on .NET"),
            Some(Language::Csharp)
        );
        assert_eq!(
            detect_language_from_request("fastapi app with pytest"),
            Some(Language::Python)
        );
    }

    #[test]
    fn request_without_keywords_is_undetected() {
        assert_eq!(detect_language_from_request("build a REST API with health check"), None);
    }

    #[test]
    fn keyword_must_be_a_whole_word() {
        // "going" must not count as Go, "rusty" must not count as Rust.
        assert_eq!(detect_language_from_request("going somewhere rusty"), None);
    }
}
