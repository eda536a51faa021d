//! Starting or resuming a run.
//!
//! A run is identified by its persisted loop state. If the state file exists
//! it is resumed verbatim (counters and `started_at` included); otherwise a
//! fresh record is created and written before the first cycle.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::loop_state::LoopState;
use crate::error::StoreError;
use crate::io::idea_store::IdeaDir;
use crate::io::index_store::MarkdownIndex;
use crate::io::loop_state::{load_loop_state, write_loop_state};

/// Outcome of [`start_or_resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub state: LoopState,
    pub resumed: bool,
}

/// Load the persisted loop state, or create and persist a fresh one.
pub fn start_or_resume(state_path: &Path, now: DateTime<Utc>) -> Result<StartOutcome, StoreError> {
    if let Some(state) = load_loop_state(state_path)? {
        info!(
            deployed = state.deployed_count,
            cycles = state.cycle_count,
            "resuming run"
        );
        return Ok(StartOutcome {
            state,
            resumed: true,
        });
    }
    let state = LoopState::fresh(now);
    write_loop_state(state_path, &state)?;
    debug!(path = %state_path.display(), "fresh run state written");
    Ok(StartOutcome {
        state,
        resumed: false,
    })
}

/// Ensure the idea directory and index file exist.
pub fn prepare_stores(index: &MarkdownIndex, ideas: &IdeaDir) -> Result<(), StoreError> {
    ideas.ensure_exists()?;
    index.ensure_exists()
}
