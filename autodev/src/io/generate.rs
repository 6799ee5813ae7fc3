//! Text generation backends.
//!
//! The [`Generator`] trait decouples steps from the model runtime. The default
//! implementation pipes a rendered transcript into a configured command
//! (e.g. `ollama run <model>`) and reads the reply from stdout.

use std::collections::BTreeMap;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::state::excerpt;
use crate::core::types::{Message, Role};
use crate::io::config::{BackendConfig, DEFAULT_BACKEND, PipelineConfig};
use crate::io::process::run_command_with_timeout;

/// Abstraction over text generation.
pub trait Generator {
    /// Produce a reply for `messages` using the logical backend `backend`.
    fn generate(&self, backend: &str, messages: &[Message]) -> Result<String>;
}

/// Render messages as a plain transcript for stdin-driven backends.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let heading = match message.role {
            Role::System => "### System",
            Role::User => "### User",
        };
        out.push_str(heading);
        out.push('\n');
        out.push_str(message.content.trim());
        out.push_str("\n\n");
    }
    out.push_str("### Assistant\n");
    out
}

/// Generator that runs one subprocess per request.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    backends: BTreeMap<String, BackendConfig>,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            backends: config.backends.clone(),
            output_limit_bytes: config.tool_output_limit_bytes,
        }
    }

    /// Look up `backend`, falling back to `default` when it is not configured.
    fn resolve(&self, backend: &str) -> Result<(&str, &BackendConfig)> {
        if let Some((name, cfg)) = self.backends.get_key_value(backend) {
            return Ok((name.as_str(), cfg));
        }
        debug!(backend, "backend not configured, using default");
        self.backends
            .get_key_value(DEFAULT_BACKEND)
            .map(|(name, cfg)| (name.as_str(), cfg))
            .ok_or_else(|| anyhow!("no `{DEFAULT_BACKEND}` backend configured"))
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(backend))]
    fn generate(&self, backend: &str, messages: &[Message]) -> Result<String> {
        let (name, cfg) = self.resolve(backend)?;
        let (program, args) = cfg
            .command
            .split_first()
            .ok_or_else(|| anyhow!("backend `{name}` has an empty command"))?;
        info!(backend = name, program = %program, "generating");

        let transcript = render_transcript(messages);
        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_command_with_timeout(
            cmd,
            Some(transcript.as_bytes()),
            cfg.timeout(),
            self.output_limit_bytes,
        )
        .with_context(|| format!("run backend `{name}`"))?;

        if output.timed_out {
            bail!("backend `{name}` timed out after {}s", cfg.timeout_secs);
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(backend = name, code = ?output.exit_code(), "backend failed");
            bail!(
                "backend `{name}` exited with {:?}: {}",
                output.exit_code(),
                excerpt(stderr.trim(), 300)
            );
        }
        let reply = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(backend = name, chars = reply.len(), "generation finished");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(command: &[&str]) -> CommandGenerator {
        let mut config = PipelineConfig::default();
        config.backends.clear();
        config.backends.insert(
            DEFAULT_BACKEND.to_string(),
            BackendConfig {
                command: command.iter().map(|s| s.to_string()).collect(),
                timeout_secs: 10,
            },
        );
        CommandGenerator::new(&config)
    }

    #[test]
    fn transcript_lists_roles_in_order() {
        let text = render_transcript(&[Message::system("be brief"), Message::user(" hi ")]);
        assert_eq!(
            text,
            "### System\nbe brief\n\n### User\nhi\n\n### Assistant\n"
        );
    }

    #[test]
    fn unknown_backend_uses_default_and_reads_stdout() {
        let reply = generator(&["cat"])
            .generate("planning", &[Message::user("echo me")])
            .expect("generate");
        assert!(reply.contains("### User\necho me"));
    }

    #[test]
    fn failing_backend_is_an_error() {
        let err = generator(&["sh", "-c", "echo boom >&2; exit 2"])
            .generate(DEFAULT_BACKEND, &[Message::user("x")])
            .expect_err("should fail");
        assert!(format!("{err:#}").contains("boom"));
    }
}
