//! Stop conditions evaluated before every cycle.

use chrono::{DateTime, Utc};

use crate::core::loop_state::LoopState;
use crate::core::saturation::{SaturationDecision, assess};
use crate::core::types::{LoopLimits, StopReason};

/// Return the first stop condition that holds, in fixed priority order:
/// idea quota, runtime budget, saturation.
pub fn stop_condition(
    state: &LoopState,
    limits: &LoopLimits,
    now: DateTime<Utc>,
) -> Option<StopReason> {
    if state.deployed_count >= limits.max_ideas {
        return Some(StopReason::IdeaQuotaReached);
    }
    if elapsed_hours(state.started_at, now) >= limits.max_runtime_hours {
        return Some(StopReason::RuntimeBudgetExhausted);
    }
    if assess(state.consecutive_failures, limits.max_consecutive_failures)
        == SaturationDecision::Stop
    {
        return Some(StopReason::IdeaSpaceSaturated);
    }
    None
}

fn elapsed_hours(started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = now.signed_duration_since(started_at);
    elapsed.num_milliseconds().max(0) as f64 / 3_600_000.0
}
