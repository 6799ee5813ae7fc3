//! I/O helpers for pipeline steps.

pub mod analyzer;
pub mod config;
pub mod dispatch;
pub mod generate;
pub mod git;
pub mod process;
pub mod prompt;
pub mod session;
pub mod workspace;
