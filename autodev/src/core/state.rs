//! The pipeline state record threaded through every step.
//!
//! Fields that must not change after creation (`request`, `working_directory`)
//! and fields with ordering rules (`implementation_attempts`, `branch_name`,
//! `log`) are private and only reachable through methods that uphold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::types::Task;

/// Default ceiling on implementation attempts.
pub const DEFAULT_MAX_IMPLEMENTATION_ATTEMPTS: u32 = 3;

/// Single mutable record for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    request: String,
    working_directory: PathBuf,
    pub requirements_doc: String,
    pub design_doc: String,
    pub tasks: Vec<Task>,
    branch_name: String,
    pub lint_passed: bool,
    pub tests_passed: bool,
    pub security_passed: bool,
    pub pull_request_ref: String,
    implementation_attempts: u32,
    log: Vec<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new("", PathBuf::new())
    }
}

impl PipelineState {
    pub fn new(request: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            request: request.into(),
            working_directory: working_directory.into(),
            requirements_doc: String::new(),
            design_doc: String::new(),
            tasks: Vec::new(),
            branch_name: String::new(),
            lint_passed: false,
            tests_passed: false,
            security_passed: false,
            pull_request_ref: String::new(),
            implementation_attempts: 0,
            log: Vec::new(),
        }
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }

    pub fn implementation_attempts(&self) -> u32 {
        self.implementation_attempts
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Append a log entry. The log is never cleared or reordered.
    pub fn record(&mut self, entry: impl Into<String>) {
        self.log.push(entry.into());
    }

    /// Count a new entry into the implement step and return the attempt number.
    ///
    /// Verification flags from the previous attempt are cleared so each one is
    /// set exactly once per attempt.
    pub fn begin_implementation_attempt(&mut self) -> u32 {
        self.implementation_attempts = self.implementation_attempts.saturating_add(1);
        self.lint_passed = false;
        self.tests_passed = false;
        self.security_passed = false;
        self.implementation_attempts
    }

    /// Record the branch name the first time it is known.
    ///
    /// Returns `false` (and leaves the name untouched) once a name is set.
    pub fn set_branch_once(&mut self, name: &str) -> bool {
        if !self.branch_name.is_empty() {
            return false;
        }
        self.branch_name = name.to_string();
        true
    }

    pub fn checks_passed(&self) -> bool {
        self.lint_passed && self.tests_passed && self.security_passed
    }

    /// Most recent log entry truncated to `max_chars`.
    pub fn last_log_excerpt(&self, max_chars: usize) -> String {
        self.log
            .last()
            .map(|entry| excerpt(entry, max_chars))
            .unwrap_or_default()
    }

    /// Short summary handed to the intent router.
    pub fn router_summary(&self) -> String {
        format!(
            "tasks={}, branch={}, lint_ok={}, tests_ok={}, sec_ok={}",
            self.tasks.len(),
            dash_if_empty(&self.branch_name),
            self.lint_passed,
            self.tests_passed,
            self.security_passed
        )
    }

    /// One-line status for interactive output.
    pub fn status_line(&self) -> String {
        format!(
            "branch={} lint_ok={} tests_ok={} sec_ok={} pr={} attempts={}",
            dash_if_empty(&self.branch_name),
            self.lint_passed,
            self.tests_passed,
            self.security_passed,
            dash_if_empty(&self.pull_request_ref),
            self.implementation_attempts
        )
    }
}

fn dash_if_empty(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
