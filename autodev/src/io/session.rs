//! Session snapshot storage (`.agent/state.json`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::state::PipelineState;

/// Directory (relative to the project root) holding pipeline artifacts.
pub const AGENT_DIR: &str = ".agent";

/// Well-known artifact locations for a project root.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub agent_dir: PathBuf,
    pub state_path: PathBuf,
    pub config_path: PathBuf,
}

impl AgentPaths {
    pub fn new(root: &Path) -> Self {
        let agent_dir = root.join(AGENT_DIR);
        Self {
            state_path: agent_dir.join("state.json"),
            config_path: agent_dir.join("config.toml"),
            agent_dir,
        }
    }
}

/// Load a snapshot from disk.
pub fn load_state(path: &Path) -> Result<PipelineState> {
    debug!(path = %path.display(), "loading session state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    let state: PipelineState = serde_json::from_str(&contents)
        .with_context(|| format!("parse session {}", path.display()))?;
    debug!(
        attempts = state.implementation_attempts(),
        log_entries = state.log().len(),
        "session state loaded"
    );
    Ok(state)
}

/// Load the snapshot at `path` if present, else start a fresh state.
///
/// A present snapshot keeps its own request; `request` only seeds new sessions.
pub fn load_or_init(path: &Path, request: &str, working_directory: &Path) -> Result<PipelineState> {
    if path.exists() {
        return load_state(path);
    }
    debug!(path = %path.display(), "no session snapshot, starting fresh");
    Ok(PipelineState::new(request, working_directory))
}

/// Atomically write a snapshot to disk (temp file + rename).
pub fn save_state(path: &Path, state: &PipelineState) -> Result<()> {
    debug!(
        path = %path.display(),
        attempts = state.implementation_attempts(),
        "writing session state"
    );
    let mut buf = serde_json::to_string_pretty(state).context("serialize session state")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("session path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp session {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace session {}", path.display()))?;
    Ok(())
}
