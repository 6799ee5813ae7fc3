//! Stable exit codes for autodev CLI commands.

/// Command succeeded; for `run`, every check passed.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or other errors.
pub const INVALID: i32 = 1;
/// `autodev run` finished, but lint, tests or the audit did not pass.
pub const CHECKS_FAILED: i32 = 2;
