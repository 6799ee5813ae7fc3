//! Prompt rendering for generation backends.
//!
//! Each template carries `<!-- role:system -->` and `<!-- role:user -->`
//! markers; the rendered text is split on them into a message list.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::language::Language;
use crate::core::profile::ProjectProfile;
use crate::core::state::excerpt;
use crate::core::types::{Message, Role, Task};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const ARCHITECT_TEMPLATE: &str = include_str!("prompts/architect.md");
const DEVELOPER_TEMPLATE: &str = include_str!("prompts/developer.md");
const ROUTER_TEMPLATE: &str = include_str!("prompts/router.md");

/// Upper bound on the repository summary handed to the architect.
pub const REPO_SUMMARY_CHARS: usize = 4000;

static ROLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*role:(system|user)\s*-->").expect("role marker regex"));

/// Inputs for the developer prompt.
#[derive(Debug, Clone)]
pub struct DeveloperPrompt<'a> {
    pub request: &'a str,
    pub language: Language,
    pub profile: &'a ProjectProfile,
    pub rfc: &'a str,
    pub tasks: &'a [Task],
    pub attempt: u32,
    pub feedback: Option<&'a str>,
}

#[derive(Serialize)]
struct TaskContext<'a> {
    id: &'a str,
    title: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("architect", ARCHITECT_TEMPLATE)
            .expect("architect template should be valid");
        env.add_template("developer", DEVELOPER_TEMPLATE)
            .expect("developer template should be valid");
        env.add_template("router", ROUTER_TEMPLATE)
            .expect("router template should be valid");
        Self { env }
    }

    pub fn planner(&self, request: &str) -> Result<Vec<Message>> {
        let rendered = self.env.get_template("planner")?.render(context! {
            request => request.trim(),
        })?;
        split_roles(&rendered)
    }

    pub fn architect(&self, request: &str, prd: &str, repo_summary: &str) -> Result<Vec<Message>> {
        let summary = excerpt(repo_summary.trim(), REPO_SUMMARY_CHARS);
        let rendered = self.env.get_template("architect")?.render(context! {
            request => request.trim(),
            prd => prd.trim(),
            repo_summary => (!summary.is_empty()).then_some(summary),
        })?;
        split_roles(&rendered)
    }

    pub fn developer(&self, input: &DeveloperPrompt<'_>) -> Result<Vec<Message>> {
        let profile = serde_json::to_string_pretty(input.profile)?;
        let tasks: Vec<TaskContext<'_>> = input
            .tasks
            .iter()
            .map(|task| TaskContext {
                id: &task.id,
                title: &task.title,
            })
            .collect();
        let rendered = self.env.get_template("developer")?.render(context! {
            request => input.request.trim(),
            language => input.language.as_str(),
            profile => profile,
            rfc => input.rfc.trim(),
            tasks => tasks,
            attempt => input.attempt,
            feedback => input.feedback.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        split_roles(&rendered)
    }

    pub fn router(&self, text: &str, state_summary: &str) -> Result<Vec<Message>> {
        let rendered = self.env.get_template("router")?.render(context! {
            text => text.trim(),
            state_summary => state_summary,
        })?;
        split_roles(&rendered)
    }
}

/// Split rendered text on role markers into trimmed messages.
fn split_roles(rendered: &str) -> Result<Vec<Message>> {
    let markers: Vec<_> = ROLE_RE.captures_iter(rendered).collect();
    if markers.is_empty() {
        bail!("rendered prompt has no role markers");
    }
    let mut messages = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(role)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let role = if role.as_str() == "system" {
            Role::System
        } else {
            Role::User
        };
        let content = rendered[whole.end()..end].trim().to_string();
        messages.push(Message { role, content });
    }
    debug!(messages = messages.len(), "prompt rendered");
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies every template renders to a system message followed by a user message.
    #[test]
    fn templates_render_system_then_user() {
        let engine = PromptEngine::new();
        let profile = ProjectProfile::default();
        let tasks = vec![Task::new("task1", "Build the API")];
        let rendered = [
            engine.planner("build an api").expect("planner"),
            engine.architect("req", "# PRD", "README.md").expect("architect"),
            engine
                .developer(&DeveloperPrompt {
                    request: "req",
                    language: Language::Go,
                    profile: &profile,
                    rfc: "# RFC",
                    tasks: &tasks,
                    attempt: 2,
                    feedback: Some("tests failed"),
                })
                .expect("developer"),
            engine.router("run tests", "tasks=0").expect("router"),
        ];
        for messages in rendered {
            let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
            assert_eq!(roles, vec![Role::System, Role::User]);
            assert!(messages.iter().all(|m| !m.content.is_empty()));
        }
    }

    /// Verifies developer prompt carries tasks, language hints, and retry feedback.
    #[test]
    fn developer_prompt_includes_context() {
        let engine = PromptEngine::new();
        let profile = ProjectProfile::default();
        let tasks = vec![Task::new("t1", "Add health endpoint")];
        let messages = engine
            .developer(&DeveloperPrompt {
                request: "health check",
                language: Language::Go,
                profile: &profile,
                rfc: "# RFC",
                tasks: &tasks,
                attempt: 2,
                feedback: Some("lint failed"),
            })
            .expect("developer");
        assert!(messages[0].content.contains("Go standard library"));
        assert!(messages[1].content.contains("- [t1] Add health endpoint"));
        assert!(messages[1].content.contains("lint failed"));
    }

    /// Verifies the architect prompt omits the repository block when there is no summary.
    #[test]
    fn architect_prompt_skips_empty_summary() {
        let engine = PromptEngine::new();
        let messages = engine.architect("req", "# PRD", "  ").expect("architect");
        assert!(!messages[1].content.contains("<repository>"));
    }
}
