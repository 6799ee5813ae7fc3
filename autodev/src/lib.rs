//! Multi-step feature delivery pipeline.
//!
//! A request flows through `plan → design → implement → verify-tests →
//! verify-security → assemble-pr`, with failed verification looping back to
//! `implement` until an attempt ceiling is reached. The crate is split:
//!
//! - **[`core`]**: Pure, deterministic logic (state, edge predicates, response
//!   normalization, project classification). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, git, subprocesses,
//!   generation backends). Behind traits where tests need doubles.
//! - **[`agents`]**: One module per step, combining core logic with I/O.
//!
//! [`graph`] drives the steps for batch runs; [`repl`] runs them on demand.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod graph;
pub mod io;
pub mod logging;
pub mod repl;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
