//! Pure edge predicates for the orchestration graph.

use crate::core::state::PipelineState;
use crate::core::types::StepName;

/// Destination after a step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Step(StepName),
    Done,
}

/// Routing decision for the step that just ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: Next,
    /// True when the attempt ceiling overrode a failing verification.
    pub forced: bool,
}

impl Transition {
    fn to(step: StepName) -> Self {
        Self {
            next: Next::Step(step),
            forced: false,
        }
    }

    fn forced(step: StepName) -> Self {
        Self {
            next: Next::Step(step),
            forced: true,
        }
    }
}

/// Entry step of every run.
pub const START: StepName = StepName::Plan;

/// Decide where the graph goes after `current`.
pub fn next_step(current: StepName, state: &PipelineState, ceiling: u32) -> Transition {
    let exhausted = state.implementation_attempts() >= ceiling;
    match current {
        StepName::Plan => Transition::to(StepName::Design),
        StepName::Design => Transition::to(StepName::Implement),
        StepName::Implement => Transition::to(StepName::VerifyTests),
        StepName::VerifyTests => {
            if state.tests_passed && state.lint_passed {
                Transition::to(StepName::VerifySecurity)
            } else if exhausted {
                Transition::forced(StepName::VerifySecurity)
            } else {
                Transition::to(StepName::Implement)
            }
        }
        StepName::VerifySecurity => {
            if state.security_passed {
                Transition::to(StepName::AssemblePr)
            } else if exhausted {
                Transition::forced(StepName::AssemblePr)
            } else {
                Transition::to(StepName::Implement)
            }
        }
        StepName::AssemblePr => Transition {
            next: Next::Done,
            forced: false,
        },
    }
}

/// Upper bound on steps executed for a given ceiling.
///
/// Each of the `ceiling` attempts costs at most implement + verify-tests +
/// verify-security; plan, design and assemble-pr run once.
pub fn step_budget(ceiling: u32) -> u32 {
    ceiling.saturating_mul(3).saturating_add(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_attempts(attempts: u32) -> PipelineState {
        let mut state = PipelineState::new("req", "/tmp");
        for _ in 0..attempts {
            state.begin_implementation_attempt();
        }
        state
    }

    #[test]
    fn linear_edges_are_unconditional() {
        let state = state_with_attempts(0);
        assert_eq!(
            next_step(StepName::Plan, &state, 3).next,
            Next::Step(StepName::Design)
        );
        assert_eq!(
            next_step(StepName::Design, &state, 3).next,
            Next::Step(StepName::Implement)
        );
        assert_eq!(
            next_step(StepName::Implement, &state, 3).next,
            Next::Step(StepName::VerifyTests)
        );
        assert_eq!(next_step(StepName::AssemblePr, &state, 3).next, Next::Done);
    }

    #[test]
    fn failing_lint_retries_below_ceiling() {
        let mut state = state_with_attempts(1);
        state.tests_passed = true;
        let transition = next_step(StepName::VerifyTests, &state, 3);
        assert_eq!(transition.next, Next::Step(StepName::Implement));
        assert!(!transition.forced);
    }

    #[test]
    fn ceiling_forces_progress_past_failing_checks() {
        let state = state_with_attempts(3);
        let tests = next_step(StepName::VerifyTests, &state, 3);
        assert_eq!(tests.next, Next::Step(StepName::VerifySecurity));
        assert!(tests.forced);
        let security = next_step(StepName::VerifySecurity, &state, 3);
        assert_eq!(security.next, Next::Step(StepName::AssemblePr));
        assert!(security.forced);
    }

    #[test]
    fn passing_checks_are_not_reported_as_forced() {
        let mut state = state_with_attempts(3);
        state.security_passed = true;
        let transition = next_step(StepName::VerifySecurity, &state, 3);
        assert_eq!(transition.next, Next::Step(StepName::AssemblePr));
        assert!(!transition.forced);
    }

    #[test]
    fn never_routes_to_implement_once_exhausted() {
        for attempts in 3..6 {
            let state = state_with_attempts(attempts);
            for step in StepName::ALL {
                if step == StepName::Design {
                    continue;
                }
                assert_ne!(
                    next_step(step, &state, 3).next,
                    Next::Step(StepName::Implement),
                    "{step} at {attempts} attempts"
                );
            }
        }
    }

    #[test]
    fn budget_covers_three_steps_per_attempt() {
        assert_eq!(step_budget(1), 6);
        assert_eq!(step_budget(3), 12);
    }
}
