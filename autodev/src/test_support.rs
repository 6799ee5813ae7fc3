//! Scripted collaborators and project fixtures for tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;

use anyhow::{Result, bail};
use tempfile::TempDir;

use crate::agents::StepContext;
use crate::core::language::Language;
use crate::core::state::PipelineState;
use crate::core::types::{Capability, Message};
use crate::io::config::PipelineConfig;
use crate::io::dispatch::{DispatchOutput, Dispatcher};
use crate::io::generate::Generator;
use crate::io::git::BranchManager;
use crate::io::prompt::PromptEngine;

/// Generator that replays queued replies and records every call.
///
/// Once the queue is empty, `generate` fails.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<(String, Vec<Message>)>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: impl Into<String>) {
        self.replies.borrow_mut().push_back(reply.into());
    }

    /// `(backend, messages)` for every call so far.
    pub fn calls(&self) -> Vec<(String, Vec<Message>)> {
        self.calls.borrow().clone()
    }

    pub fn backends(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(backend, _)| backend.clone())
            .collect()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, backend: &str, messages: &[Message]) -> Result<String> {
        self.calls
            .borrow_mut()
            .push((backend.to_string(), messages.to_vec()));
        match self.replies.borrow_mut().pop_front() {
            Some(reply) => Ok(reply),
            None => bail!("no scripted reply left for backend `{backend}`"),
        }
    }
}

/// Dispatcher with a fixed exit code per capability (0 unless set).
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    exits: RefCell<BTreeMap<Capability, i32>>,
    calls: RefCell<Vec<(Capability, Language)>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exit(&self, capability: Capability, exit_code: i32) {
        self.exits.borrow_mut().insert(capability, exit_code);
    }

    pub fn calls(&self) -> Vec<(Capability, Language)> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, capability: Capability) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(called, _)| *called == capability)
            .count()
    }
}

impl Dispatcher for ScriptedDispatcher {
    fn dispatch(
        &self,
        capability: Capability,
        language: Language,
        _directory: &Path,
    ) -> DispatchOutput {
        self.calls.borrow_mut().push((capability, language));
        let code = self.exits.borrow().get(&capability).copied().unwrap_or(0);
        DispatchOutput::new(code, format!("scripted {capability} exit={code}"))
    }
}

/// Branch manager that records requests instead of touching git.
#[derive(Debug, Default)]
pub struct RecordingBranches {
    requests: RefCell<Vec<String>>,
    fail: bool,
}

impl RecordingBranches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request fails, as outside a git checkout.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl BranchManager for RecordingBranches {
    fn ensure_branch(&self, _workdir: &Path, branch: &str) -> Result<()> {
        self.requests.borrow_mut().push(branch.to_string());
        if self.fail {
            bail!("not a git repository");
        }
        Ok(())
    }
}

/// Scratch project plus scripted collaborators for driving steps.
pub struct Harness {
    pub project: TempDir,
    pub generator: ScriptedGenerator,
    pub dispatcher: ScriptedDispatcher,
    pub branches: RecordingBranches,
    pub config: PipelineConfig,
    pub prompts: PromptEngine,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator) -> Self {
        Self {
            project: tempfile::tempdir().expect("create project tempdir"),
            generator,
            dispatcher: ScriptedDispatcher::new(),
            branches: RecordingBranches::new(),
            config: PipelineConfig::default(),
            prompts: PromptEngine::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.project.path()
    }

    pub fn context(&self) -> StepContext<'_> {
        StepContext {
            generator: &self.generator,
            dispatcher: &self.dispatcher,
            branches: &self.branches,
            config: &self.config,
            prompts: &self.prompts,
        }
    }

    /// Fresh state rooted at the scratch project.
    pub fn state(&self, request: &str) -> PipelineState {
        PipelineState::new(request, self.root())
    }

    pub fn write(&self, rel: &str, contents: &str) {
        write_project_file(self.root(), rel, contents);
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel))
            .unwrap_or_else(|err| panic!("read {rel}: {err}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root().join(rel).exists()
    }
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_project_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture directory");
    }
    fs::write(&path, contents).expect("write fixture file");
}

/// JSON reply for a planner backend.
pub fn plan_reply(prd: &str, titles: &[&str]) -> String {
    let tasks: Vec<serde_json::Value> = titles
        .iter()
        .map(|title| serde_json::json!({ "title": title }))
        .collect();
    serde_json::json!({ "prd_md": prd, "tasks": tasks }).to_string()
}

/// JSON reply for a developer backend.
pub fn files_reply(files: &[(&str, &str)], summary: &str) -> String {
    let files: Vec<serde_json::Value> = files
        .iter()
        .map(|(path, content)| serde_json::json!({ "path": path, "content": content }))
        .collect();
    serde_json::json!({ "files": files, "summary": summary }).to_string()
}
