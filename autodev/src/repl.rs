//! Interactive loop for `autodev repl`.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::agents::StepContext;
use crate::agents::router::route;
use crate::core::state::PipelineState;
use crate::core::types::Intent;
use crate::graph::run_step;

pub const HELP_TEXT: &str = "Commands: plan, design, dev, tests, security, pr, status, help.\n\
Type natural language and the router will choose. Prefix with / to force, e.g. /tests";

const LOG_TAIL_CHARS: usize = 160;

/// Read commands from `input` until `exit`, `quit` or EOF.
///
/// Each executed step is followed by `persist`; a failed save is reported and
/// the session continues. Only failures writing to `output` are returned.
pub fn run_repl<R, W, P>(
    ctx: &StepContext<'_>,
    state: &mut PipelineState,
    input: R,
    output: &mut W,
    mut persist: P,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    P: FnMut(&PipelineState) -> Result<()>,
{
    writeln!(output, "autodev interactive session. Type 'exit' to quit.\n{HELP_TEXT}")
        .context("write banner")?;
    let mut lines = input.lines();
    loop {
        write!(output, "you> ").context("write prompt")?;
        output.flush().context("flush prompt")?;
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                warn!(error = %err, "stdin read failed");
                writeln!(output).context("write newline")?;
                break;
            }
            None => {
                writeln!(output).context("write newline")?;
                break;
            }
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let routed = route(ctx, text, state);
        debug!(intent = %routed.intent, "routed input");
        match routed.intent {
            Intent::Status => {
                writeln!(output, "status> {}", state.status_line()).context("write status")?;
            }
            Intent::Help => {
                writeln!(output, "{HELP_TEXT}").context("write help")?;
            }
            intent => {
                let Some(step) = intent.step() else {
                    writeln!(output, "(no action)").context("write output")?;
                    continue;
                };
                run_step(ctx, step, state);
                if let Err(err) = persist(state) {
                    writeln!(output, "error> could not save session: {err:#}")
                        .context("write error")?;
                    continue;
                }
                writeln!(
                    output,
                    "ok> {intent} done. Logs tail: {}",
                    state.last_log_excerpt(LOG_TAIL_CHARS)
                )
                .context("write result")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, ScriptedGenerator, plan_reply};
    use anyhow::bail;
    use std::io::Cursor;

    fn drive(harness: &Harness, script: &str) -> (String, PipelineState, usize) {
        let mut state = harness.state("add login");
        let mut out = Vec::new();
        let mut saves = 0;
        run_repl(
            &harness.context(),
            &mut state,
            Cursor::new(script.to_string()),
            &mut out,
            |_| {
                saves += 1;
                Ok(())
            },
        )
        .expect("repl");
        (String::from_utf8(out).expect("utf8"), state, saves)
    }

    #[test]
    fn status_help_and_exit() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let (out, _, saves) = drive(&harness, "/status\n\n/help\nexit\n/plan\n");
        assert!(out.contains(
            "status> branch=- lint_ok=false tests_ok=false sec_ok=false pr=- attempts=0"
        ));
        assert_eq!(out.matches("Commands: plan").count(), 2);
        assert_eq!(saves, 0);
        assert!(harness.generator.calls().is_empty());
    }

    #[test]
    fn forced_step_runs_and_saves() {
        let harness = Harness::new(ScriptedGenerator::new([plan_reply("# PRD", &["Login form"])]));
        let (out, state, saves) = drive(&harness, "/plan\n");
        assert!(out.contains("ok> plan done. Logs tail: plan: 1 tasks (direct)"));
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(saves, 1);
    }

    #[test]
    fn free_text_is_routed_and_eof_ends_session() {
        let harness = Harness::new(ScriptedGenerator::new([r#"{"intent":"status"}"#]));
        let (out, state, _) = drive(&harness, "where are we?");
        assert!(out.contains("status> "));
        assert!(out.ends_with("you> \n"));
        assert_eq!(
            state.log().last().map(String::as_str),
            Some("router: routed to status (direct)")
        );
    }

    #[test]
    fn save_failure_is_reported_not_fatal() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let mut state = harness.state("x");
        let mut out = Vec::new();
        run_repl(
            &harness.context(),
            &mut state,
            Cursor::new("/pr\n/status\n".to_string()),
            &mut out,
            |_| bail!("disk full"),
        )
        .expect("repl");
        let out = String::from_utf8(out).expect("utf8");
        assert!(out.contains("error> could not save session: disk full"));
        assert!(out.contains("pr=.agent/PR.md"));
    }
}
