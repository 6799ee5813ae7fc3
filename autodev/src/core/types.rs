//! Shared deterministic types for the pipeline core.
//!
//! These types define stable contracts between steps. They carry no I/O and
//! serialize deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named node of the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    Plan,
    Design,
    Implement,
    VerifyTests,
    VerifySecurity,
    AssemblePr,
}

impl StepName {
    pub const ALL: [StepName; 6] = [
        StepName::Plan,
        StepName::Design,
        StepName::Implement,
        StepName::VerifyTests,
        StepName::VerifySecurity,
        StepName::AssemblePr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Plan => "plan",
            StepName::Design => "design",
            StepName::Implement => "implement",
            StepName::VerifyTests => "verify-tests",
            StepName::VerifySecurity => "verify-security",
            StepName::AssemblePr => "assemble-pr",
        }
    }

    pub fn parse(raw: &str) -> Option<StepName> {
        StepName::ALL.into_iter().find(|step| step.as_str() == raw)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interactive intent chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Plan,
    Design,
    Dev,
    Tests,
    Security,
    Pr,
    Status,
    Help,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::Plan,
        Intent::Design,
        Intent::Dev,
        Intent::Tests,
        Intent::Security,
        Intent::Pr,
        Intent::Status,
        Intent::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Plan => "plan",
            Intent::Design => "design",
            Intent::Dev => "dev",
            Intent::Tests => "tests",
            Intent::Security => "security",
            Intent::Pr => "pr",
            Intent::Status => "status",
            Intent::Help => "help",
        }
    }

    /// Parse an intent name, also accepting graph step names.
    pub fn parse(raw: &str) -> Option<Intent> {
        let raw = raw.trim().to_ascii_lowercase();
        if let Some(intent) = Intent::ALL.into_iter().find(|i| i.as_str() == raw) {
            return Some(intent);
        }
        StepName::parse(&raw).map(Intent::from)
    }

    /// Graph step executed for this intent, if any.
    pub fn step(self) -> Option<StepName> {
        match self {
            Intent::Plan => Some(StepName::Plan),
            Intent::Design => Some(StepName::Design),
            Intent::Dev => Some(StepName::Implement),
            Intent::Tests => Some(StepName::VerifyTests),
            Intent::Security => Some(StepName::VerifySecurity),
            Intent::Pr => Some(StepName::AssemblePr),
            Intent::Status | Intent::Help => None,
        }
    }
}

impl From<StepName> for Intent {
    fn from(step: StepName) -> Self {
        match step {
            StepName::Plan => Intent::Plan,
            StepName::Design => Intent::Design,
            StepName::Implement => Intent::Dev,
            StepName::VerifyTests => Intent::Tests,
            StepName::VerifySecurity => Intent::Security,
            StepName::AssemblePr => Intent::Pr,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification or preparation action parameterized by language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Test,
    Lint,
    Build,
    Install,
    Audit,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Test => "test",
            Capability::Lint => "lint",
            Capability::Build => "build",
            Capability::Install => "install",
            Capability::Audit => "audit",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Planner record after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerOutput {
    pub prd_md: String,
    pub tasks: Vec<Task>,
}

/// One file produced by the implementation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Output contract of the implementation step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneratedFileSet {
    pub files: Vec<GeneratedFile>,
    pub summary: String,
}

/// Router decision after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutput {
    pub intent: Intent,
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parse_accepts_step_names() {
        assert_eq!(Intent::parse("implement"), Some(Intent::Dev));
        assert_eq!(Intent::parse("verify-tests"), Some(Intent::Tests));
        assert_eq!(Intent::parse("Security"), Some(Intent::Security));
        assert_eq!(Intent::parse("deploy"), None);
    }

    #[test]
    fn step_names_serialize_kebab_case() {
        let raw = serde_json::to_string(&StepName::VerifySecurity).expect("serialize");
        assert_eq!(raw, "\"verify-security\"");
    }
}
