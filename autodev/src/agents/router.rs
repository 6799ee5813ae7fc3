//! Intent routing for interactive input.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::normalize::normalize_route;
use crate::core::state::PipelineState;
use crate::core::types::{Intent, RouteOutput};
use crate::io::config::DEFAULT_BACKEND;

use super::StepContext;

/// Parse a `/command` without consulting a backend.
///
/// Returns `None` when `text` is not a forced command. Unknown commands map
/// to `help`; any words after the command are kept under `args.rest`.
pub fn forced_route(text: &str) -> Option<RouteOutput> {
    let command = text.trim().strip_prefix('/')?;
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let intent = Intent::parse(name).unwrap_or(Intent::Help);
    let mut args = Map::new();
    if !rest.is_empty() {
        args.insert("rest".to_string(), Value::String(rest.to_string()));
    }
    Some(RouteOutput { intent, args })
}

/// Classify `text` into an intent.
///
/// Never fails: backend or decoding problems resolve to `help`. Every
/// backend round trip and how its reply was decoded is recorded in the run
/// log; forced commands bypass the backend and leave no entry.
pub fn route(ctx: &StepContext<'_>, text: &str, state: &mut PipelineState) -> RouteOutput {
    if let Some(forced) = forced_route(text) {
        debug!(intent = %forced.intent, "forced route");
        return forced;
    }
    let help = RouteOutput {
        intent: Intent::Help,
        args: Map::new(),
    };
    let messages = match ctx.prompts.router(text, &state.router_summary()) {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "router prompt failed");
            state.record(format!("router: prompt failed: {err:#}; using help"));
            return help;
        }
    };
    let raw = match ctx.generator.generate(DEFAULT_BACKEND, &messages) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "router generation failed");
            state.record(format!(
                "router: generation via `{DEFAULT_BACKEND}` failed: {err:#}; using help"
            ));
            return help;
        }
    };
    let routed = normalize_route(&raw, ctx.config.raw_excerpt_chars);
    for note in routed.notes {
        state.record(note);
    }
    state.record(format!(
        "router: routed to {} ({})",
        routed.value.intent,
        routed.recovery.as_str()
    ));
    routed.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, ScriptedGenerator};

    #[test]
    fn forced_commands_accept_intents_and_step_names() {
        let cases = [
            ("/status", Intent::Status),
            ("/dev", Intent::Dev),
            ("/implement", Intent::Dev),
            ("/verify-tests", Intent::Tests),
            ("/assemble-pr", Intent::Pr),
            ("/bogus", Intent::Help),
        ];
        for (text, intent) in cases {
            assert_eq!(forced_route(text).expect(text).intent, intent, "{text}");
        }
        assert!(forced_route("run the tests").is_none());
    }

    #[test]
    fn forced_command_keeps_trailing_words() {
        let out = forced_route("/plan add login").expect("forced");
        assert_eq!(out.intent, Intent::Plan);
        assert_eq!(out.args["rest"], Value::String("add login".to_string()));
    }

    #[test]
    fn forced_status_never_calls_generator() {
        let harness = Harness::new(ScriptedGenerator::empty());
        let mut state = harness.state("x");
        let out = route(&harness.context(), "/status", &mut state);
        assert_eq!(out.intent, Intent::Status);
        assert!(harness.generator.calls().is_empty());
        assert!(state.log().is_empty());
    }

    #[test]
    fn free_text_goes_to_default_backend_with_state_summary() {
        let harness = Harness::new(ScriptedGenerator::new([
            r#"{"intent":"tests","args":{}}"#,
        ]));
        let mut state = harness.state("x");
        let out = route(&harness.context(), "please run the tests", &mut state);
        assert_eq!(out.intent, Intent::Tests);
        let calls = harness.generator.calls();
        assert_eq!(calls[0].0, DEFAULT_BACKEND);
        assert!(calls[0].1[1].content.contains("tasks=0, branch=-"));
        assert_eq!(
            state.log(),
            ["router: parsed response directly", "router: routed to tests (direct)"]
        );
    }

    #[test]
    fn unknown_or_failed_routes_become_help() {
        let harness = Harness::new(ScriptedGenerator::new([r#"{"intent":"deploy"}"#]));
        let mut state = harness.state("x");
        assert_eq!(route(&harness.context(), "ship it", &mut state).intent, Intent::Help);
        // The script is now exhausted, so generation fails.
        assert_eq!(route(&harness.context(), "again", &mut state).intent, Intent::Help);

        let log = state.log();
        assert!(log.iter().any(|e| e == "router: unknown intent 'deploy' coerced to help"));
        assert!(log.last().expect("entry").starts_with("router: generation via `default` failed"));
    }
}
