//! I/O collaborators for the idea loop.

pub mod completion;
pub mod config;
pub mod idea_store;
pub mod index_store;
pub mod interrupt;
pub mod loop_state;
pub mod prompt;
pub mod task;
