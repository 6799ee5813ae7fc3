//! Capability dispatch: run the toolchain recipe for `(capability, language)`.
//!
//! The [`Dispatcher`] trait decouples steps from real toolchains. Tests use
//! scripted dispatchers that return predetermined outcomes.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::language::Language;
use crate::core::types::Capability;
use crate::io::config::PipelineConfig;
use crate::io::process::{is_command_not_found, run_command_with_timeout};

/// Exit code reported for a missing tool when missing tools do not pass.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when a recipe exceeds its timeout.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Normalized result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutput {
    pub exit_code: i32,
    pub output: String,
}

impl DispatchOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Abstraction over toolchain execution.
pub trait Dispatcher {
    /// Run `capability` for `language` in `directory`. Never fails; problems
    /// are folded into the exit code and output.
    fn dispatch(&self, capability: Capability, language: Language, directory: &Path)
    -> DispatchOutput;
}

/// One way to perform a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    pub primary: &'static [&'static str],
    /// Tried only when the primary tool is missing.
    pub fallback: Option<&'static [&'static str]>,
    /// The recipe applies only if this file exists in the project root.
    pub marker: Option<&'static str>,
    pub timeout_secs: u64,
}

impl Recipe {
    const fn new(primary: &'static [&'static str], timeout_secs: u64) -> Self {
        Self {
            primary,
            fallback: None,
            marker: None,
            timeout_secs,
        }
    }

    const fn or(mut self, fallback: &'static [&'static str]) -> Self {
        self.fallback = Some(fallback);
        self
    }

    const fn when(mut self, marker: &'static str) -> Self {
        self.marker = Some(marker);
        self
    }

    fn applies(&self, directory: &Path) -> bool {
        self.marker.is_none_or(|marker| directory.join(marker).exists())
    }
}

const LINT_SECS: u64 = 60;
const TEST_SECS: u64 = 120;
const SLOW_TEST_SECS: u64 = 180;
const INSTALL_SECS: u64 = 180;
const AUDIT_SECS: u64 = 120;

const BUILTIN_RECIPES: &[(Capability, Language, Recipe)] = &[
    // test
    (
        Capability::Test,
        Language::Python,
        Recipe::new(&["pytest", "-q"], TEST_SECS).or(&["python3", "-m", "unittest", "discover"]),
    ),
    (
        Capability::Test,
        Language::Javascript,
        Recipe::new(&["npm", "test"], TEST_SECS).when("package.json"),
    ),
    (
        Capability::Test,
        Language::Typescript,
        Recipe::new(&["npm", "test"], TEST_SECS).when("package.json"),
    ),
    (
        Capability::Test,
        Language::Csharp,
        Recipe::new(&["dotnet", "test"], TEST_SECS),
    ),
    (
        Capability::Test,
        Language::Java,
        Recipe::new(&["mvn", "-q", "test"], SLOW_TEST_SECS).when("pom.xml"),
    ),
    (
        Capability::Test,
        Language::Java,
        Recipe::new(&["./gradlew", "test"], SLOW_TEST_SECS)
            .or(&["gradle", "test"])
            .when("build.gradle"),
    ),
    (
        Capability::Test,
        Language::Go,
        Recipe::new(&["go", "test", "./..."], TEST_SECS),
    ),
    (
        Capability::Test,
        Language::Rust,
        Recipe::new(&["cargo", "test"], SLOW_TEST_SECS),
    ),
    (
        Capability::Test,
        Language::Php,
        Recipe::new(&["vendor/bin/phpunit"], TEST_SECS).or(&["phpunit"]),
    ),
    (
        Capability::Test,
        Language::Ruby,
        Recipe::new(&["bundle", "exec", "rake", "test"], TEST_SECS).or(&["rake", "test"]),
    ),
    // lint
    (
        Capability::Lint,
        Language::Python,
        Recipe::new(&["ruff", "check", "."], LINT_SECS).or(&["flake8", "."]),
    ),
    (
        Capability::Lint,
        Language::Javascript,
        Recipe::new(&["npx", "--no-install", "eslint", "."], LINT_SECS).when("package.json"),
    ),
    (
        Capability::Lint,
        Language::Typescript,
        Recipe::new(&["npx", "--no-install", "eslint", "."], LINT_SECS)
            .or(&["tsc", "--noEmit"])
            .when("package.json"),
    ),
    (
        Capability::Lint,
        Language::Csharp,
        Recipe::new(&["dotnet", "format", "--verify-no-changes"], LINT_SECS),
    ),
    (
        Capability::Lint,
        Language::Go,
        Recipe::new(&["go", "vet", "./..."], LINT_SECS),
    ),
    (
        Capability::Lint,
        Language::Rust,
        Recipe::new(&["cargo", "clippy", "--", "-D", "warnings"], LINT_SECS)
            .when("Cargo.toml"),
    ),
    (
        Capability::Lint,
        Language::Php,
        Recipe::new(&["vendor/bin/phpcs", "."], LINT_SECS).or(&["phpcs", "."]),
    ),
    (
        Capability::Lint,
        Language::Ruby,
        Recipe::new(&["rubocop"], LINT_SECS),
    ),
    // build
    (
        Capability::Build,
        Language::Python,
        Recipe::new(&["python3", "-m", "compileall", "-q", "."], 60),
    ),
    (
        Capability::Build,
        Language::Javascript,
        Recipe::new(&["npm", "run", "build", "--if-present"], 120).when("package.json"),
    ),
    (
        Capability::Build,
        Language::Typescript,
        Recipe::new(&["npx", "--no-install", "tsc", "--noEmit"], 120).or(&["tsc", "--noEmit"]),
    ),
    (
        Capability::Build,
        Language::Csharp,
        Recipe::new(&["dotnet", "build"], 180),
    ),
    (
        Capability::Build,
        Language::Java,
        Recipe::new(&["mvn", "-q", "compile"], 180).when("pom.xml"),
    ),
    (
        Capability::Build,
        Language::Java,
        Recipe::new(&["./gradlew", "build"], 180)
            .or(&["gradle", "build"])
            .when("build.gradle"),
    ),
    (
        Capability::Build,
        Language::Go,
        Recipe::new(&["go", "build", "./..."], 120),
    ),
    (
        Capability::Build,
        Language::Rust,
        Recipe::new(&["cargo", "build"], 180).when("Cargo.toml"),
    ),
    (
        Capability::Build,
        Language::Php,
        Recipe::new(&["composer", "validate"], 60).when("composer.json"),
    ),
    // install
    (
        Capability::Install,
        Language::Python,
        Recipe::new(&["pip", "install", "-r", "requirements.txt"], INSTALL_SECS)
            .or(&["pip3", "install", "-r", "requirements.txt"])
            .when("requirements.txt"),
    ),
    (
        Capability::Install,
        Language::Python,
        Recipe::new(&["pip", "install", "-e", "."], INSTALL_SECS)
            .or(&["pip3", "install", "-e", "."])
            .when("pyproject.toml"),
    ),
    (
        Capability::Install,
        Language::Javascript,
        Recipe::new(&["npm", "install"], INSTALL_SECS).when("package.json"),
    ),
    (
        Capability::Install,
        Language::Typescript,
        Recipe::new(&["npm", "install"], INSTALL_SECS).when("package.json"),
    ),
    (
        Capability::Install,
        Language::Csharp,
        Recipe::new(&["dotnet", "restore"], INSTALL_SECS),
    ),
    (
        Capability::Install,
        Language::Java,
        Recipe::new(&["mvn", "-q", "dependency:resolve"], INSTALL_SECS).when("pom.xml"),
    ),
    (
        Capability::Install,
        Language::Go,
        Recipe::new(&["go", "mod", "tidy"], INSTALL_SECS).when("go.mod"),
    ),
    (
        Capability::Install,
        Language::Rust,
        Recipe::new(&["cargo", "fetch"], INSTALL_SECS).when("Cargo.toml"),
    ),
    (
        Capability::Install,
        Language::Php,
        Recipe::new(&["composer", "install"], INSTALL_SECS).when("composer.json"),
    ),
    (
        Capability::Install,
        Language::Ruby,
        Recipe::new(&["bundle", "install"], INSTALL_SECS).when("Gemfile"),
    ),
    // audit
    (
        Capability::Audit,
        Language::Python,
        Recipe::new(&["pip-audit"], AUDIT_SECS).or(&["safety", "check"]),
    ),
    (
        Capability::Audit,
        Language::Javascript,
        Recipe::new(&["npm", "audit", "--audit-level=high"], AUDIT_SECS).when("package.json"),
    ),
    (
        Capability::Audit,
        Language::Typescript,
        Recipe::new(&["npm", "audit", "--audit-level=high"], AUDIT_SECS).when("package.json"),
    ),
    (
        Capability::Audit,
        Language::Csharp,
        Recipe::new(&["dotnet", "list", "package", "--vulnerable"], AUDIT_SECS),
    ),
    (
        Capability::Audit,
        Language::Go,
        Recipe::new(&["govulncheck", "./..."], AUDIT_SECS),
    ),
    (
        Capability::Audit,
        Language::Rust,
        Recipe::new(&["cargo-audit", "audit"], AUDIT_SECS).when("Cargo.lock"),
    ),
    (
        Capability::Audit,
        Language::Php,
        Recipe::new(&["composer", "audit"], AUDIT_SECS).when("composer.lock"),
    ),
    (
        Capability::Audit,
        Language::Ruby,
        Recipe::new(&["bundle-audit", "check"], AUDIT_SECS).when("Gemfile.lock"),
    ),
];

/// Ordered recipes keyed by capability and language.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    recipes: BTreeMap<(Capability, Language), Vec<Recipe>>,
}

impl Registry {
    /// Registry of the built-in toolchain recipes.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for (capability, language, recipe) in BUILTIN_RECIPES {
            registry.insert(*capability, *language, *recipe);
        }
        registry
    }

    /// Append a recipe; earlier recipes take precedence.
    pub fn insert(&mut self, capability: Capability, language: Language, recipe: Recipe) {
        self.recipes
            .entry((capability, language))
            .or_default()
            .push(recipe);
    }

    pub fn recipes(&self, capability: Capability, language: Language) -> &[Recipe] {
        self.recipes
            .get(&(capability, language))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First recipe whose marker exists (or that has none).
    pub fn select(
        &self,
        capability: Capability,
        language: Language,
        directory: &Path,
    ) -> Option<&Recipe> {
        self.recipes(capability, language)
            .iter()
            .find(|recipe| recipe.applies(directory))
    }
}

/// Dispatcher that shells out to real toolchains.
#[derive(Debug, Clone)]
pub struct ToolchainDispatcher {
    registry: Registry,
    output_limit_bytes: usize,
    missing_tool_passes: bool,
}

impl ToolchainDispatcher {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_registry(
            Registry::builtin(),
            config.tool_output_limit_bytes,
            config.missing_tool_passes,
        )
    }

    pub fn with_registry(
        registry: Registry,
        output_limit_bytes: usize,
        missing_tool_passes: bool,
    ) -> Self {
        Self {
            registry,
            output_limit_bytes,
            missing_tool_passes,
        }
    }

    fn missing(&self, capability: Capability, tools: &str) -> DispatchOutput {
        let message = format!("{tools} not found; {capability} skipped");
        warn!(%capability, tools, "toolchain missing");
        if self.missing_tool_passes {
            DispatchOutput::new(0, message)
        } else {
            DispatchOutput::new(EXIT_NOT_FOUND, message)
        }
    }

    fn run(&self, argv: &[&str], directory: &Path, timeout: Duration) -> Attempt {
        let Some((program, args)) = argv.split_first() else {
            return Attempt::Done(DispatchOutput::new(1, "empty recipe command"));
        };
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(directory);
        match run_command_with_timeout(cmd, None, timeout, self.output_limit_bytes) {
            Ok(out) if out.timed_out => {
                let mut output = out.combined(program);
                output.push_str(&format!(
                    "\n[{} timed out after {}s]\n",
                    argv.join(" "),
                    timeout.as_secs()
                ));
                Attempt::Done(DispatchOutput::new(EXIT_TIMED_OUT, output))
            }
            Ok(out) => match out.exit_code() {
                Some(EXIT_NOT_FOUND) => Attempt::NotFound,
                Some(code) => Attempt::Done(DispatchOutput::new(code, out.combined(program))),
                None => {
                    let mut output = out.combined(program);
                    output.push_str("\n[terminated by signal]\n");
                    Attempt::Done(DispatchOutput::new(1, output))
                }
            },
            Err(err) if is_command_not_found(&err) => Attempt::NotFound,
            Err(err) => Attempt::Done(DispatchOutput::new(
                1,
                format!("failed to run {}: {err:#}", argv.join(" ")),
            )),
        }
    }
}

enum Attempt {
    Done(DispatchOutput),
    NotFound,
}

impl Dispatcher for ToolchainDispatcher {
    #[instrument(skip_all, fields(%capability, %language))]
    fn dispatch(
        &self,
        capability: Capability,
        language: Language,
        directory: &Path,
    ) -> DispatchOutput {
        let Some(recipe) = self.registry.select(capability, language, directory) else {
            debug!("no applicable recipe");
            return DispatchOutput::new(0, format!("no {capability} recipe for {language}"));
        };
        let timeout = Duration::from_secs(recipe.timeout_secs);
        info!(command = %recipe.primary.join(" "), "dispatching");

        match self.run(recipe.primary, directory, timeout) {
            Attempt::Done(output) => output,
            Attempt::NotFound => {
                let Some(fallback) = recipe.fallback else {
                    return self.missing(capability, recipe.primary[0]);
                };
                info!(command = %fallback.join(" "), "primary tool missing, trying fallback");
                match self.run(fallback, directory, timeout) {
                    Attempt::Done(output) => output,
                    Attempt::NotFound => self.missing(
                        capability,
                        &format!("{} and {}", recipe.primary[0], fallback[0]),
                    ),
                }
            }
        }
    }
}
