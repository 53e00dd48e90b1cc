//! Stable exit codes for postflow CLI commands.

/// Command succeeded; every requested post was approved.
pub const OK: i32 = 0;
/// Invalid input, config, or credentials, or any other command error.
pub const INVALID: i32 = 1;
/// At least one post exhausted the revision loop.
pub const EXHAUSTED: i32 = 2;
/// At least one post failed on a provider or renderer error.
pub const FAILED: i32 = 3;
