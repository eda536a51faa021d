//! Persisted loop state (`.loop_state.json`).

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::loop_state::LoopState;
use crate::error::StoreError;

/// Load loop state from disk. Returns `None` when no run has been recorded yet.
pub fn load_loop_state(path: &Path) -> Result<Option<LoopState>, StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "no loop state yet");
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).map_err(|err| StoreError::io("read loop state", path, err))?;
    let state: LoopState =
        serde_json::from_str(&contents).map_err(|source| StoreError::StateFormat {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        deployed = state.deployed_count,
        cycles = state.cycle_count,
        status = state.status.as_str(),
        "loop state loaded"
    );
    Ok(Some(state))
}

/// Atomically overwrite loop state on disk (temp file + rename).
pub fn write_loop_state(path: &Path, state: &LoopState) -> Result<(), StoreError> {
    debug!(
        path = %path.display(),
        deployed = state.deployed_count,
        misfires = state.misfire_count,
        cycles = state.cycle_count,
        status = state.status.as_str(),
        "writing loop state"
    );
    let mut buf = serde_json::to_string_pretty(state).map_err(|source| StoreError::StateFormat {
        path: path.to_path_buf(),
        source,
    })?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| StoreError::io("create state directory", parent, err))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .map_err(|err| StoreError::io("write temp loop state", &tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| StoreError::io("replace loop state", path, err))
}
