//! Stable exit codes for dispatch CLI commands.

/// Command succeeded, or a hook permitted/admitted.
pub const OK: i32 = 0;
/// Command failed due to invalid input, state or config, or `lint` found no file.
pub const INVALID: i32 = 1;
/// `file-guard` denied a write, `task-completed` rejected a unit, or `lint`
/// found format errors.
pub const DENY: i32 = 2;
/// `lint` found only warnings.
pub const WARNINGS: i32 = 3;
