//! Pipeline steps.
//!
//! Each step module exposes `run`, which may fail, and `recover`, which
//! applies the step's deterministic fallback after a failure. Both append to
//! the product log in [`PipelineState`].

use crate::core::language::{Language, detect_language_from_request};
use crate::core::profile::ProjectProfile;
use crate::core::state::{PipelineState, excerpt};
use crate::core::types::Capability;
use crate::io::config::PipelineConfig;
use crate::io::dispatch::{DispatchOutput, Dispatcher};
use crate::io::generate::Generator;
use crate::io::git::BranchManager;
use crate::io::prompt::PromptEngine;

pub mod architect;
pub mod developer;
pub mod planner;
pub mod pr;
pub mod router;
pub mod security;
pub mod verifier;

/// Logical backend for requirement planning.
pub const PLANNING_BACKEND: &str = "planning";
/// Logical backend for design documents.
pub const ARCHITECTURE_BACKEND: &str = "architecture";

/// Collaborators shared by every step.
pub struct StepContext<'a> {
    pub generator: &'a dyn Generator,
    pub dispatcher: &'a dyn Dispatcher,
    pub branches: &'a dyn BranchManager,
    pub config: &'a PipelineConfig,
    pub prompts: &'a PromptEngine,
}

/// Language used for generation and tooling: the analyzed primary language,
/// else keywords in the request, else python.
pub fn resolve_language(profile: &ProjectProfile, request: &str) -> Language {
    if profile.primary_language != Language::Unknown {
        return profile.primary_language;
    }
    detect_language_from_request(request).unwrap_or(Language::Python)
}

/// Log a tool run as `<step>: <capability> (<language>): exit=<code>` plus an
/// output excerpt.
pub(crate) fn record_tool_run(
    state: &mut PipelineState,
    step: &str,
    capability: Capability,
    language: Language,
    output: &DispatchOutput,
    excerpt_chars: usize,
) {
    let body = excerpt(output.output.trim(), excerpt_chars);
    let mut entry = format!(
        "{step}: {capability} ({language}): exit={}",
        output.exit_code
    );
    if !body.is_empty() {
        entry.push('\n');
        entry.push_str(&body);
    }
    state.record(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_resolution_prefers_profile_then_request() {
        let mut profile = ProjectProfile::default();
        assert_eq!(resolve_language(&profile, "a tiny tool"), Language::Python);
        assert_eq!(
            resolve_language(&profile, "write a golang service"),
            Language::Go
        );
        profile.primary_language = Language::Rust;
        assert_eq!(resolve_language(&profile, "write a golang service"), Language::Rust);
    }

    #[test]
    fn tool_runs_are_logged_with_exit_code() {
        let mut state = PipelineState::new("req", "/tmp");
        record_tool_run(
            &mut state,
            "verify-tests",
            Capability::Lint,
            Language::Python,
            &DispatchOutput::new(1, "E501 line too long"),
            5,
        );
        assert_eq!(state.log(), ["verify-tests: lint (python): exit=1\nE501 ..."]);
    }
}
