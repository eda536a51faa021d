//! Stable exit codes for `think-tank` commands.

/// Command succeeded; `run` stopped on quota, runtime budget or interruption.
pub const OK: i32 = 0;
/// Fatal error (store failure, backend failure outside the loop, ...).
pub const ERROR: i32 = 1;
/// Configuration was missing or invalid; nothing was started.
pub const CONFIG: i32 = 2;
/// `run` stopped because the idea space is saturated.
pub const SATURATED: i32 = 3;
