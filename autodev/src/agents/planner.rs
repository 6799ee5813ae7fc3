//! `plan` step: requirements document and task list.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::normalize::{Recovery, fallback_plan, normalize_plan};
use crate::core::state::PipelineState;
use crate::core::types::PlannerOutput;
use crate::io::workspace::write_artifact;

use super::{PLANNING_BACKEND, StepContext};

pub const PRD_ARTIFACT: &str = "PRD.md";

#[instrument(skip_all)]
pub fn run(ctx: &StepContext<'_>, state: &mut PipelineState) -> Result<()> {
    let messages = ctx.prompts.planner(state.request())?;
    let raw = ctx
        .generator
        .generate(PLANNING_BACKEND, &messages)
        .context("planner generation")?;
    let plan = normalize_plan(&raw, state.request(), ctx.config.raw_excerpt_chars);
    for note in plan.notes {
        state.record(note);
    }
    adopt(state, plan.value, plan.recovery)
}

/// Adopt the fallback plan after `run` failed.
pub fn recover(_ctx: &StepContext<'_>, state: &mut PipelineState) {
    let plan = fallback_plan(state.request());
    if let Err(err) = adopt(state, plan, Recovery::Fallback) {
        warn!(error = %format!("{err:#}"), "fallback PRD not written");
        state.record(format!("plan: could not write fallback PRD: {err:#}"));
    }
}

fn adopt(state: &mut PipelineState, plan: PlannerOutput, recovery: Recovery) -> Result<()> {
    state.requirements_doc = plan.prd_md;
    state.tasks = plan.tasks;
    info!(tasks = state.tasks.len(), recovery = recovery.as_str(), "plan ready");
    let path = write_artifact(state.working_directory(), PRD_ARTIFACT, &state.requirements_doc)?;
    state.record(format!(
        "plan: {} tasks ({}); wrote {}",
        state.tasks.len(),
        recovery.as_str(),
        path.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, ScriptedGenerator};

    #[test]
    fn planner_reply_becomes_prd_and_tasks() {
        let harness = Harness::new(ScriptedGenerator::new([
            r##"{"prd_md":"# PRD\nhealth","tasks":[{"title":"Add /health"}]}"##,
        ]));
        let mut state = harness.state("add a health endpoint");
        run(&harness.context(), &mut state).expect("plan");

        assert_eq!(state.requirements_doc, "# PRD\nhealth");
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].id, "task1");
        assert_eq!(harness.generator.backends(), vec![PLANNING_BACKEND.to_string()]);
        let prd = harness.read(".agent/PRD.md");
        assert_eq!(prd, "# PRD\nhealth\n");
    }

    #[test]
    fn prose_reply_falls_back_to_default_plan() {
        let harness = Harness::new(ScriptedGenerator::new(["Sure! Here is my plan..."]));
        let mut state = harness.state("build a cli");
        run(&harness.context(), &mut state).expect("plan");

        assert_eq!(state.tasks.len(), 3);
        assert!(state.requirements_doc.contains("Request: build a cli"));
        assert!(state.log().iter().any(|entry| entry.contains("using fallback")));
    }

    #[test]
    fn recover_writes_fallback_prd() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let mut state = harness.state("anything");
        recover(&harness.context(), &mut state);
        assert_eq!(state.tasks[0].id, "task1");
        assert!(harness.read(".agent/PRD.md").starts_with("# PRD"));
    }
}
