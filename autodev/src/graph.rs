//! Orchestration graph: drives the pipeline steps over one [`PipelineState`].
//!
//! Step failures never abort a run: they are logged and the step's fallback is
//! applied. The only error a run can return is [`StepBudgetExceeded`].

use std::fmt;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::agents::{StepContext, architect, developer, planner, pr, security, verifier};
use crate::core::state::PipelineState;
use crate::core::transitions::{Next, START, next_step, step_budget};
use crate::core::types::StepName;

/// Raised when a run executes more steps than the ceiling allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBudgetExceeded {
    pub budget: u32,
    pub next: StepName,
}

impl fmt::Display for StepBudgetExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step budget of {} exhausted before running {}",
            self.budget, self.next
        )
    }
}

impl std::error::Error for StepBudgetExceeded {}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub steps_executed: u32,
    /// Steps in execution order.
    pub trace: Vec<StepName>,
}

/// Execute a single step, applying its fallback if it fails.
#[instrument(skip_all, fields(%step))]
pub fn run_step(ctx: &StepContext<'_>, step: StepName, state: &mut PipelineState) {
    let (run, recover): (
        fn(&StepContext<'_>, &mut PipelineState) -> Result<()>,
        fn(&StepContext<'_>, &mut PipelineState),
    ) = match step {
        StepName::Plan => (planner::run, planner::recover),
        StepName::Design => (architect::run, architect::recover),
        StepName::Implement => (developer::run, developer::recover),
        StepName::VerifyTests => (verifier::run, verifier::recover),
        StepName::VerifySecurity => (security::run, security::recover),
        StepName::AssemblePr => (pr::run, pr::recover),
    };
    if let Err(err) = run(ctx, state) {
        warn!(error = %format!("{err:#}"), "step failed, applying fallback");
        state.record(format!("{step}: failed: {err:#}"));
        recover(ctx, state);
    }
}

/// Run the full graph from `plan` to `assemble-pr`.
pub fn run_pipeline(ctx: &StepContext<'_>, state: PipelineState) -> Result<PipelineOutcome> {
    run_pipeline_with(ctx, state, |_, _| {})
}

/// Like [`run_pipeline`], calling `on_step` after every step.
pub fn run_pipeline_with<F: FnMut(StepName, &PipelineState)>(
    ctx: &StepContext<'_>,
    state: PipelineState,
    on_step: F,
) -> Result<PipelineOutcome> {
    let ceiling = ctx.config.max_implementation_attempts;
    drive(ctx, state, ceiling, step_budget(ceiling), on_step)
}

#[instrument(skip_all, fields(ceiling, budget))]
fn drive<F: FnMut(StepName, &PipelineState)>(
    ctx: &StepContext<'_>,
    mut state: PipelineState,
    ceiling: u32,
    budget: u32,
    mut on_step: F,
) -> Result<PipelineOutcome> {
    let mut trace = Vec::new();
    let mut current = START;
    loop {
        if trace.len() as u32 >= budget {
            return Err(StepBudgetExceeded {
                budget,
                next: current,
            }
            .into());
        }
        info!(step = %current, "running step");
        run_step(ctx, current, &mut state);
        trace.push(current);
        on_step(current, &state);

        let transition = next_step(current, &state, ceiling);
        match transition.next {
            Next::Done => break,
            Next::Step(next) => {
                if transition.forced {
                    warn!(
                        attempts = state.implementation_attempts(),
                        %next,
                        "attempt ceiling forced progress"
                    );
                    state.record(format!(
                        "graph: {} of {ceiling} implementation attempts used; continuing to {next} despite failing checks",
                        state.implementation_attempts()
                    ));
                }
                current = next;
            }
        }
    }
    info!(
        steps = trace.len(),
        attempts = state.implementation_attempts(),
        "pipeline finished"
    );
    Ok(PipelineOutcome {
        state,
        steps_executed: trace.len() as u32,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Capability;
    use crate::test_support::{Harness, ScriptedGenerator, files_reply, plan_reply};

    fn scripted_run() -> ScriptedGenerator {
        let files = files_reply(&[("app.py", "print('ok')\n")], "app");
        ScriptedGenerator::new([
            plan_reply("# PRD", &["Build it"]),
            "# RFC".to_string(),
            files.clone(),
            files.clone(),
            files,
        ])
    }

    #[test]
    fn passing_run_visits_each_step_once() {
        let harness = Harness::new(scripted_run());
        let outcome = run_pipeline(&harness.context(), harness.state("tiny tool")).expect("run");
        assert_eq!(outcome.trace, StepName::ALL.to_vec());
        assert_eq!(outcome.state.implementation_attempts(), 1);
        assert!(outcome.state.checks_passed());
    }

    #[test]
    fn step_errors_apply_fallbacks_and_run_completes() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let outcome = run_pipeline(&harness.context(), harness.state("tiny tool")).expect("run");
        let log = outcome.state.log();
        assert!(log.iter().any(|e| e.starts_with("plan: failed: planner generation")));
        assert!(log.iter().any(|e| e.starts_with("design: failed")));
        assert_eq!(outcome.state.tasks.len(), 3);
        assert_eq!(outcome.state.pull_request_ref, ".agent/PR.md");
        assert!(harness.exists(".agent/RFC.md"));
    }

    #[test]
    fn forced_progress_is_logged() {
        let harness = Harness::new(scripted_run());
        harness.dispatcher.set_exit(Capability::Test, 1);
        let outcome = run_pipeline(&harness.context(), harness.state("tiny tool")).expect("run");
        assert_eq!(outcome.steps_executed, 10);
        let forced: Vec<&String> = outcome
            .state
            .log()
            .iter()
            .filter(|e| e.starts_with("graph: 3 of 3"))
            .collect();
        assert_eq!(forced.len(), 1);
    }

    #[test]
    fn exceeding_the_budget_is_a_typed_error() {
        let harness = Harness::new(scripted_run());
        harness.dispatcher.set_exit(Capability::Audit, 1);
        let err = drive(&harness.context(), harness.state("x"), 3, 5, |_, _| {})
            .expect_err("budget");
        let exceeded = err.downcast_ref::<StepBudgetExceeded>().expect("typed");
        assert_eq!(exceeded.budget, 5);
        assert_eq!(exceeded.next, StepName::Implement);
    }
}
