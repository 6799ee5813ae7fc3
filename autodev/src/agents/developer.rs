//! `implement` step: generate files, write them, install dependencies.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::language::Language;
use crate::core::normalize::normalize_file_set;
use crate::core::scaffold::fallback_files;
use crate::core::state::{PipelineState, excerpt};
use crate::core::types::{Capability, GeneratedFileSet};
use crate::io::analyzer::analyze;
use crate::io::prompt::DeveloperPrompt;
use crate::io::workspace::write_generated_files;

use super::{StepContext, record_tool_run, resolve_language};

/// Log entries from the previous attempt fed back into the next prompt.
const FEEDBACK_ENTRIES: usize = 4;

#[instrument(skip_all)]
pub fn run(ctx: &StepContext<'_>, state: &mut PipelineState) -> Result<()> {
    let attempt = begin(ctx, state);
    let root = state.working_directory().to_path_buf();
    let profile = analyze(&root);
    let language = resolve_language(&profile, state.request());
    let backend = ctx.config.backend_for_language(language);
    info!(attempt, %language, backend, "implementing");

    let feedback =
        (attempt > 1).then(|| retry_feedback(state, ctx.config.tool_output_excerpt_chars));
    let messages = ctx.prompts.developer(&DeveloperPrompt {
        request: state.request(),
        language,
        profile: &profile,
        rfc: &state.design_doc,
        tasks: &state.tasks,
        attempt,
        feedback: feedback.as_deref(),
    })?;
    let raw = ctx
        .generator
        .generate(backend, &messages)
        .with_context(|| format!("developer generation via `{backend}`"))?;

    let set = normalize_file_set(&raw, ctx.config.raw_excerpt_chars, || {
        fallback_files(language, state.request())
    });
    for note in set.notes {
        state.record(note);
    }
    apply(ctx, state, &root, language, &set.value);
    Ok(())
}

/// Write the language scaffold after `run` failed.
///
/// The attempt was already counted by `run`, which increments first.
pub fn recover(ctx: &StepContext<'_>, state: &mut PipelineState) {
    let root = state.working_directory().to_path_buf();
    let language = resolve_language(&analyze(&root), state.request());
    let set = fallback_files(language, state.request());
    state.record(format!("implement: using {}", set.summary));
    apply(ctx, state, &root, language, &set);
}

/// Count the attempt and make sure the feature branch exists.
fn begin(ctx: &StepContext<'_>, state: &mut PipelineState) -> u32 {
    let attempt = state.begin_implementation_attempt();
    state.record(format!("implement: attempt {attempt}"));
    if state.branch_name().is_empty() {
        let branch = ctx.config.branch_name.as_str();
        match ctx.branches.ensure_branch(state.working_directory(), branch) {
            Ok(()) => state.record(format!("implement: on branch {branch}")),
            Err(err) => {
                warn!(branch, error = %format!("{err:#}"), "branch setup failed");
                state.record(format!("implement: branch setup failed ({err:#}); continuing"));
            }
        }
        state.set_branch_once(branch);
    }
    attempt
}

fn apply(
    ctx: &StepContext<'_>,
    state: &mut PipelineState,
    root: &Path,
    language: Language,
    set: &GeneratedFileSet,
) {
    let report = write_generated_files(root, set);
    for line in report.log_lines() {
        state.record(format!("implement: {line}"));
    }
    let summary = if set.summary.trim().is_empty() {
        "no summary".to_string()
    } else {
        excerpt(set.summary.trim(), ctx.config.raw_excerpt_chars)
    };
    state.record(format!(
        "implement: {} file(s) written, {} skipped ({summary})",
        report.written.len(),
        report.skipped.len()
    ));
    if report.written.is_empty() {
        return;
    }
    let install = ctx.dispatcher.dispatch(Capability::Install, language, root);
    record_tool_run(
        state,
        "implement",
        Capability::Install,
        language,
        &install,
        ctx.config.tool_output_excerpt_chars,
    );
}

/// Verification output from the tail of the log.
fn retry_feedback(state: &PipelineState, max_chars: usize) -> String {
    let recent: Vec<&str> = state
        .log()
        .iter()
        .rev()
        .filter(|entry| entry.starts_with("verify-"))
        .take(FEEDBACK_ENTRIES)
        .map(String::as_str)
        .collect();
    let joined = recent.into_iter().rev().collect::<Vec<_>>().join("\n");
    excerpt(&joined, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, ScriptedGenerator};

    const GO_FILES: &str = r#"{"files":[{"path":"main.go","content":"package main\n"}],"summary":"go service"}"#;

    #[test]
    fn first_attempt_sets_branch_and_writes_files() {
        let harness = Harness::new(ScriptedGenerator::new([GO_FILES]));
        let mut state = harness.state("a golang service");
        state.lint_passed = true;
        run(&harness.context(), &mut state).expect("implement");

        assert_eq!(state.implementation_attempts(), 1);
        assert!(!state.lint_passed);
        assert_eq!(state.branch_name(), "feat/auto-agent");
        assert_eq!(harness.branches.requests(), vec!["feat/auto-agent".to_string()]);
        assert_eq!(harness.read("main.go"), "package main\n");
        assert_eq!(
            harness.dispatcher.calls(),
            vec![(Capability::Install, Language::Go)]
        );
        assert_eq!(harness.generator.backends(), vec!["coding".to_string()]);
    }

    #[test]
    fn branch_is_created_only_once() {
        let harness = Harness::new(ScriptedGenerator::new([GO_FILES, GO_FILES]));
        let mut state = harness.state("a golang service");
        run(&harness.context(), &mut state).expect("first");
        run(&harness.context(), &mut state).expect("second");
        assert_eq!(state.implementation_attempts(), 2);
        assert_eq!(harness.branches.requests().len(), 1);
    }

    #[test]
    fn unusable_reply_writes_python_api_scaffold() {
        let harness = Harness::new(ScriptedGenerator::new(["no json here"]));
        let mut state = harness.state("REST API with a health check");
        run(&harness.context(), &mut state).expect("implement");

        assert!(state.log().iter().any(|e| e.contains("using fallback")));
        assert!(state.log().iter().any(|e| e.starts_with("implement: wrote ")));
        assert_eq!(
            harness.dispatcher.calls(),
            vec![(Capability::Install, Language::Python)]
        );
    }

    #[test]
    fn retry_prompt_carries_verification_feedback() {
        let harness = Harness::new(ScriptedGenerator::new([GO_FILES, GO_FILES]));
        let mut state = harness.state("a golang service");
        run(&harness.context(), &mut state).expect("first");
        state.record("verify-tests: test (go): exit=1\nFAIL main_test.go");
        run(&harness.context(), &mut state).expect("second");

        let calls = harness.generator.calls();
        assert!(calls[1].1[1].content.contains("FAIL main_test.go"));
    }

    #[test]
    fn recover_counts_no_extra_attempt() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let mut state = harness.state("a tiny script");
        let err = run(&harness.context(), &mut state).expect_err("no reply scripted");
        assert!(format!("{err:#}").contains("developer generation"));
        recover(&harness.context(), &mut state);
        assert_eq!(state.implementation_attempts(), 1);
        assert!(state.log().iter().any(|e| e.contains("Fallback python")));
    }
}
