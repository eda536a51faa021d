//! Deterministic, pure logic shared by the loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod idea;
pub mod loop_state;
pub mod parse;
pub mod saturation;
pub mod slug;
pub mod stop;
pub mod types;
