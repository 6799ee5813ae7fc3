//! Pipeline configuration stored under `.agent/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::language::Language;
use crate::core::state::DEFAULT_MAX_IMPLEMENTATION_ATTEMPTS;

/// Backend every other backend falls back to.
pub const DEFAULT_BACKEND: &str = "default";

/// Pipeline configuration (TOML).
///
/// Missing fields fall back to defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ceiling on entries into the implement step.
    pub max_implementation_attempts: u32,

    /// Branch created (or checked out) on the first implementation attempt.
    pub branch_name: String,

    /// Characters of raw generated text kept in normalizer log lines.
    pub raw_excerpt_chars: usize,

    /// Characters of tool output kept in verification log lines.
    pub tool_output_excerpt_chars: usize,

    /// Bytes of stdout/stderr kept in memory per child process.
    pub tool_output_limit_bytes: usize,

    /// Treat a missing lint/test/audit tool as a pass.
    pub missing_tool_passes: bool,

    /// Also dispatch `build` during verify-tests.
    pub run_build_check: bool,

    /// Named generation backends.
    pub backends: BTreeMap<String, BackendConfig>,

    /// Backend preference per language, tried in order.
    pub language_backends: BTreeMap<String, Vec<String>>,
}

/// A subprocess generation backend.
///
/// The rendered transcript is written to the command's stdin and its stdout is
/// taken as the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 600,
        }
    }
}

impl BackendConfig {
    fn ollama(model: &str) -> Self {
        Self {
            command: vec!["ollama".to_string(), "run".to_string(), model.to_string()],
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_backends() -> BTreeMap<String, BackendConfig> {
    [
        (DEFAULT_BACKEND, "llama3.1:8b"),
        ("planning", "llama3.1:70b"),
        ("architecture", "llama3.1:70b"),
        ("coding", "codellama:13b"),
    ]
    .into_iter()
    .map(|(name, model)| (name.to_string(), BackendConfig::ollama(model)))
    .collect()
}

fn default_language_backends() -> BTreeMap<String, Vec<String>> {
    let coding = |specific: Option<&str>| {
        specific
            .into_iter()
            .chain(["coding", DEFAULT_BACKEND])
            .map(str::to_string)
            .collect::<Vec<_>>()
    };
    [
        (Language::Python, coding(Some("python_coding"))),
        (Language::Javascript, coding(Some("javascript_coding"))),
        (Language::Typescript, coding(Some("javascript_coding"))),
        (Language::Csharp, coding(Some("csharp_coding"))),
        (Language::Java, coding(None)),
        (Language::Go, coding(None)),
        (Language::Rust, coding(None)),
    ]
    .into_iter()
    .map(|(language, names)| (language.as_str().to_string(), names))
    .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_implementation_attempts: DEFAULT_MAX_IMPLEMENTATION_ATTEMPTS,
            branch_name: "feat/auto-agent".to_string(),
            raw_excerpt_chars: 300,
            tool_output_excerpt_chars: 1000,
            tool_output_limit_bytes: 1_000_000,
            missing_tool_passes: true,
            run_build_check: false,
            backends: default_backends(),
            language_backends: default_language_backends(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_implementation_attempts == 0 {
            return Err(anyhow!("max_implementation_attempts must be >= 1"));
        }
        if self.branch_name.trim().is_empty() {
            return Err(anyhow!("branch_name must be non-empty"));
        }
        if self.tool_output_limit_bytes == 0 {
            return Err(anyhow!("tool_output_limit_bytes must be > 0"));
        }
        if !self.backends.contains_key(DEFAULT_BACKEND) {
            return Err(anyhow!("backends.{DEFAULT_BACKEND} must be configured"));
        }
        for (name, backend) in &self.backends {
            if backend.command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(anyhow!("backends.{name}.command must be a non-empty array"));
            }
            if backend.timeout_secs == 0 {
                return Err(anyhow!("backends.{name}.timeout_secs must be > 0"));
            }
        }
        Ok(())
    }

    /// Resolve the backend for coding in `language`.
    ///
    /// The first configured name in the language preference list wins; then
    /// `coding`, then `default`.
    pub fn backend_for_language(&self, language: Language) -> &str {
        let preferred = self
            .language_backends
            .get(language.as_str())
            .into_iter()
            .flatten()
            .map(String::as_str)
            .chain(["coding"]);
        for name in preferred {
            if let Some((key, _)) = self.backends.get_key_value(name) {
                return key;
            }
        }
        DEFAULT_BACKEND
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
