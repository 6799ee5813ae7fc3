//! Feature-request pipeline driver.
//!
//! `autodev run` takes a request through plan, design, implement, verification
//! and pull request assembly in one go; `autodev repl` runs the same steps one
//! at a time from typed commands. Artifacts land in `<repo>/.agent/`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use autodev::agents::StepContext;
use autodev::core::state::PipelineState;
use autodev::exit_codes;
use autodev::graph::run_pipeline_with;
use autodev::io::config::{PipelineConfig, load_config};
use autodev::io::dispatch::ToolchainDispatcher;
use autodev::io::generate::CommandGenerator;
use autodev::io::git::GitBranchManager;
use autodev::io::prompt::PromptEngine;
use autodev::io::session::{AgentPaths, load_or_init, save_state};
use autodev::logging;
use autodev::repl::run_repl;

#[derive(Parser)]
#[command(
    name = "autodev",
    version,
    about = "Plan, design, implement and verify a feature request"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole pipeline for one request.
    Run {
        /// Project directory to work in.
        #[arg(long)]
        repo_path: PathBuf,
        /// Feature request text.
        #[arg(long)]
        request: String,
        /// Config file (defaults to `<repo>/.agent/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Interactive session; steps run on demand.
    Repl {
        /// Project directory to work in.
        #[arg(long)]
        repo_path: PathBuf,
        /// Request used when no saved session exists.
        #[arg(long, default_value = "")]
        request: String,
        /// Config file (defaults to `<repo>/.agent/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            repo_path,
            request,
            config,
        } => cmd_run(&repo_path, &request, config.as_deref()),
        Command::Repl {
            repo_path,
            request,
            config,
        } => cmd_repl(&repo_path, &request, config.as_deref()),
    }
}

/// Real collaborators for a configured project.
struct Runtime {
    root: PathBuf,
    paths: AgentPaths,
    config: PipelineConfig,
    generator: CommandGenerator,
    dispatcher: ToolchainDispatcher,
    branches: GitBranchManager,
    prompts: PromptEngine,
}

impl Runtime {
    fn new(repo_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        if !repo_path.is_dir() {
            bail!("repo path {} is not a directory", repo_path.display());
        }
        let root = repo_path
            .canonicalize()
            .with_context(|| format!("resolve {}", repo_path.display()))?;
        let paths = AgentPaths::new(&root);
        let config_path = config_path.map_or_else(|| paths.config_path.clone(), Path::to_path_buf);
        let config = load_config(&config_path)?;
        info!(root = %root.display(), config = %config_path.display(), "runtime ready");
        Ok(Self {
            generator: CommandGenerator::new(&config),
            dispatcher: ToolchainDispatcher::new(&config),
            branches: GitBranchManager,
            prompts: PromptEngine::new(),
            root,
            paths,
            config,
        })
    }

    fn context(&self) -> StepContext<'_> {
        StepContext {
            generator: &self.generator,
            dispatcher: &self.dispatcher,
            branches: &self.branches,
            config: &self.config,
            prompts: &self.prompts,
        }
    }
}

fn cmd_run(repo_path: &Path, request: &str, config_path: Option<&Path>) -> Result<i32> {
    if request.trim().is_empty() {
        bail!("--request must not be empty");
    }
    let runtime = Runtime::new(repo_path, config_path)?;
    let state = PipelineState::new(request.trim(), &runtime.root);
    let outcome = run_pipeline_with(&runtime.context(), state, |step, state| {
        eprintln!("[{step}] {}", state.status_line());
    })?;
    save_state(&runtime.paths.state_path, &outcome.state)?;

    let state = &outcome.state;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "=== DONE ({} steps) ===", outcome.steps_executed)?;
    writeln!(stdout, "PRD: .agent/PRD.md, RFC: .agent/RFC.md")?;
    writeln!(stdout, "PR: {}", state.pull_request_ref)?;
    writeln!(stdout, "status: {}", state.status_line())?;
    writeln!(stdout, "\n-- Log --")?;
    for entry in state.log() {
        writeln!(stdout, "{entry}")?;
    }
    Ok(if state.checks_passed() {
        exit_codes::OK
    } else {
        exit_codes::CHECKS_FAILED
    })
}

fn cmd_repl(repo_path: &Path, request: &str, config_path: Option<&Path>) -> Result<i32> {
    let runtime = Runtime::new(repo_path, config_path)?;
    let state_path = runtime.paths.state_path.clone();
    let mut state = load_or_init(&state_path, request.trim(), &runtime.root)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_repl(
        &runtime.context(),
        &mut state,
        stdin.lock(),
        &mut stdout,
        |state| save_state(&state_path, state),
    )?;
    save_state(&state_path, &state)?;
    Ok(exit_codes::OK)
}
