//! `design` step: technical design document.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::normalize::strip_code_fences;
use crate::core::state::PipelineState;
use crate::io::workspace::{summarize_repo, write_artifact};

use super::{ARCHITECTURE_BACKEND, StepContext};

pub const RFC_ARTIFACT: &str = "RFC.md";

#[instrument(skip_all)]
pub fn run(ctx: &StepContext<'_>, state: &mut PipelineState) -> Result<()> {
    let summary = summarize_repo(state.working_directory());
    let messages = ctx
        .prompts
        .architect(state.request(), &state.requirements_doc, &summary)?;
    let raw = ctx
        .generator
        .generate(ARCHITECTURE_BACKEND, &messages)
        .context("architect generation")?;
    let doc = strip_code_fences(&raw);
    if doc.trim().is_empty() {
        state.record("design: empty design response, using fallback RFC");
        return adopt(state, fallback_rfc(state.request()));
    }
    adopt(state, doc)
}

/// Adopt a minimal design document after `run` failed.
pub fn recover(_ctx: &StepContext<'_>, state: &mut PipelineState) {
    let doc = fallback_rfc(state.request());
    if let Err(err) = adopt(state, doc) {
        warn!(error = %format!("{err:#}"), "fallback RFC not written");
        state.record(format!("design: could not write fallback RFC: {err:#}"));
    }
}

fn fallback_rfc(request: &str) -> String {
    format!(
        "# RFC\n\n## Context\n{request}\n\n## Design\nImplement the smallest change that \
         satisfies the PRD, with unit tests alongside the code.\n\n## Risks\n- Generated \
         design unavailable; review manually.\n"
    )
}

fn adopt(state: &mut PipelineState, doc: String) -> Result<()> {
    state.design_doc = doc;
    info!(chars = state.design_doc.len(), "design ready");
    let path = write_artifact(state.working_directory(), RFC_ARTIFACT, &state.design_doc)?;
    state.record(format!("design: wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, ScriptedGenerator};

    #[test]
    fn fenced_markdown_is_unwrapped() {
        let harness = Harness::new(ScriptedGenerator::new([
            "```markdown\n# RFC\nUse a router.\n```",
        ]));
        let mut state = harness.state("add routing");
        state.requirements_doc = "# PRD".to_string();
        run(&harness.context(), &mut state).expect("design");

        assert_eq!(state.design_doc, "# RFC\nUse a router.");
        assert_eq!(harness.read(".agent/RFC.md"), "# RFC\nUse a router.\n");
        let calls = harness.generator.calls();
        assert_eq!(calls[0].0, ARCHITECTURE_BACKEND);
        assert!(calls[0].1[1].content.contains("# PRD"));
    }

    #[test]
    fn blank_reply_uses_fallback_rfc() {
        let harness = Harness::new(ScriptedGenerator::new(["   "]));
        let mut state = harness.state("add routing");
        run(&harness.context(), &mut state).expect("design");
        assert!(state.design_doc.starts_with("# RFC"));
        assert!(state.design_doc.contains("add routing"));
    }
}
