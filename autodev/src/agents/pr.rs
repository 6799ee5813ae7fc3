//! `assemble-pr` step: pull request description.

use std::fmt::Write as _;

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::state::{PipelineState, excerpt};
use crate::io::session::AGENT_DIR;
use crate::io::workspace::write_artifact;

use super::StepContext;

pub const PR_ARTIFACT: &str = "PR.md";
const DESIGN_EXCERPT_CHARS: usize = 1200;

/// Reference recorded in the state, relative to the project root.
pub fn pull_request_ref() -> String {
    format!("{AGENT_DIR}/{PR_ARTIFACT}")
}

#[instrument(skip_all)]
pub fn run(_ctx: &StepContext<'_>, state: &mut PipelineState) -> Result<()> {
    let body = render(state);
    write_artifact(state.working_directory(), PR_ARTIFACT, &body)?;
    state.pull_request_ref = pull_request_ref();
    info!(reference = %state.pull_request_ref, "pull request assembled");
    state.record(format!("assemble-pr: wrote {}", state.pull_request_ref));
    Ok(())
}

/// The reference is set even when the description could not be written.
pub fn recover(_ctx: &StepContext<'_>, state: &mut PipelineState) {
    state.pull_request_ref = pull_request_ref();
    state.record(format!(
        "assemble-pr: description not written; reference set to {}",
        state.pull_request_ref
    ));
}

fn check(passed: bool) -> &'static str {
    if passed { "pass" } else { "fail" }
}

/// Markdown body of the pull request.
pub fn render(state: &PipelineState) -> String {
    let mut out = String::new();
    let title = state.request().lines().next().unwrap_or_default().trim();
    let _ = writeln!(out, "# {}", excerpt(title, 72));
    let _ = writeln!(out);
    let _ = writeln!(out, "## Request\n{}\n", state.request().trim());
    let branch = if state.branch_name().is_empty() {
        "-"
    } else {
        state.branch_name()
    };
    let _ = writeln!(out, "Branch: `{branch}`\n");

    let _ = writeln!(out, "## Tasks");
    if state.tasks.is_empty() {
        let _ = writeln!(out, "- (none)");
    }
    for task in &state.tasks {
        let _ = writeln!(out, "- [{}] {}", task.id, task.title);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Checks");
    let _ = writeln!(out, "- lint: {}", check(state.lint_passed));
    let _ = writeln!(out, "- tests: {}", check(state.tests_passed));
    let _ = writeln!(out, "- security: {}", check(state.security_passed));
    let _ = writeln!(
        out,
        "- implementation attempts: {}",
        state.implementation_attempts()
    );
    if !state.checks_passed() {
        let _ = writeln!(out, "\nSome checks failed; review before merging.");
    }

    let design = state.design_doc.trim();
    if !design.is_empty() {
        let _ = writeln!(out, "\n## Design\n{}", excerpt(design, DESIGN_EXCERPT_CHARS));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Task;
    use crate::test_support::{Harness, ScriptedGenerator};

    #[test]
    fn writes_description_and_sets_reference() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let mut state = harness.state("Add health endpoint");
        state.tasks = vec![Task::new("task1", "Route /health")];
        state.lint_passed = true;
        state.design_doc = "# RFC".to_string();
        run(&harness.context(), &mut state).expect("pr");

        assert_eq!(state.pull_request_ref, ".agent/PR.md");
        let body = harness.read(".agent/PR.md");
        assert!(body.starts_with("# Add health endpoint\n"));
        assert!(body.contains("- [task1] Route /health"));
        assert!(body.contains("- lint: pass"));
        assert!(body.contains("- tests: fail"));
        assert!(body.contains("Some checks failed"));
        assert!(body.contains("## Design\n# RFC"));
    }

    #[test]
    fn recover_still_sets_reference() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let mut state = harness.state("x");
        recover(&harness.context(), &mut state);
        assert_eq!(state.pull_request_ref, ".agent/PR.md");
        assert_eq!(state.log().len(), 1);
    }
}
