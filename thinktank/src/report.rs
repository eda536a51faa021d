//! Plain-text rendering of loop state for the operator.

use chrono::{DateTime, Utc};

use crate::core::loop_state::LoopState;
use crate::core::types::LoopLimits;

/// Render the persisted state as aligned `key : value` lines.
pub fn render_status(state: &LoopState, limits: &LoopLimits, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!("status       : {}", state.status.as_str()),
        format!("deployed     : {}/{}", state.deployed_count, limits.max_ideas),
        format!("misfires     : {}", state.misfire_count),
        format!("cycles       : {}", state.cycle_count),
        format!(
            "failures     : {}/{} consecutive",
            state.consecutive_failures, limits.max_consecutive_failures
        ),
        format!("started      : {}", state.started_at.to_rfc3339()),
        format!(
            "elapsed      : {} (budget {}h)",
            format_elapsed(state.started_at, now),
            limits.max_runtime_hours
        ),
    ];
    if let Some(reason) = state.stop_reason {
        lines.push(format!("stop reason  : {reason}"));
    }
    lines.join("\n")
}

/// Human-readable `H:MM:SS` between `start` and `now`.
pub fn format_elapsed(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(start).num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
