//! Unattended divergence loop for idea generation.
//!
//! A generator role proposes one idea per attempt and a reviewer role accepts
//! or rejects it against everything accepted so far. Accepted ideas land in an
//! append-only store and index; progress lives in a persisted loop state so a
//! run can be interrupted and resumed without loss or duplication.
//!
//! - **[`core`]**: Pure, deterministic logic (state transitions, parsing, slugs,
//!   saturation and stop policy). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (HTTP completion client, stores,
//!   config, prompts, interruption). Isolated behind traits to enable scripting
//!   in tests.
//!
//! Orchestration modules ([`cycle`], [`looping`], [`start`]) coordinate core
//! logic with I/O to implement the `run` command.

pub mod core;
pub mod cycle;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod report;
pub mod start;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
