//! The resumable loop-state record and its transitions.
//!
//! `LoopState` is replaced, never patched in place: every transition takes the
//! record by value and returns the next one. The orchestrator persists the
//! result once per transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{CycleOutcome, LoopStatus, StopReason};

/// Persisted progress of a run (`.loop_state.json`).
///
/// This record is the single source of truth for how far a run has progressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoopState {
    /// Accepted ideas; equals the number of index entries and stored artifacts.
    pub deployed_count: u32,
    /// Misfired attempts across all cycles.
    pub misfire_count: u32,
    /// Resolved cycles (deployed or exhausted).
    pub cycle_count: u32,
    /// Exhausted cycles since the last deployment.
    pub consecutive_failures: u32,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub status: LoopStatus,
    pub stop_reason: Option<StopReason>,
}

impl LoopState {
    /// State for a run that has never executed a cycle.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            deployed_count: 0,
            misfire_count: 0,
            cycle_count: 0,
            consecutive_failures: 0,
            started_at: now,
            last_updated: now,
            status: LoopStatus::Running,
            stop_reason: None,
        }
    }

    /// Fold a resolved cycle into the counters.
    ///
    /// A deployment resets `consecutive_failures`; an exhausted cycle bumps it.
    pub fn after_cycle(self, outcome: &CycleOutcome, now: DateTime<Utc>) -> Self {
        let deployed = outcome.is_deployed();
        Self {
            deployed_count: self.deployed_count + u32::from(deployed),
            misfire_count: self.misfire_count + outcome.misfires,
            cycle_count: self.cycle_count + 1,
            consecutive_failures: if deployed {
                0
            } else {
                self.consecutive_failures + 1
            },
            last_updated: now,
            ..self
        }
    }

    pub fn with_status(self, status: LoopStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            stop_reason: None,
            last_updated: now,
            ..self
        }
    }

    pub fn stopped(self, reason: StopReason, now: DateTime<Utc>) -> Self {
        Self {
            status: LoopStatus::Stopped,
            stop_reason: Some(reason),
            last_updated: now,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CycleResolution;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn deployed(misfires: u32) -> CycleOutcome {
        CycleOutcome {
            resolution: CycleResolution::Deployed {
                slug: "x".to_string(),
            },
            misfires,
        }
    }

    fn exhausted(misfires: u32) -> CycleOutcome {
        CycleOutcome {
            resolution: CycleResolution::Exhausted,
            misfires,
        }
    }

    #[test]
    fn deployment_resets_consecutive_failures() {
        let state = LoopState::fresh(at(0))
            .after_cycle(&exhausted(3), at(1))
            .after_cycle(&exhausted(3), at(2));
        assert_eq!(state.consecutive_failures, 2);

        let state = state.after_cycle(&deployed(1), at(3));
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.deployed_count, 1);
        assert_eq!(state.misfire_count, 7);
        assert_eq!(state.cycle_count, 3);
        assert_eq!(state.started_at, at(0));
        assert_eq!(state.last_updated, at(3));
    }

    #[test]
    fn stopped_records_reason_and_with_status_clears_it() {
        let state = LoopState::fresh(at(0)).stopped(StopReason::Interrupted, at(5));
        assert_eq!(state.status, LoopStatus::Stopped);
        assert_eq!(state.stop_reason, Some(StopReason::Interrupted));

        let resumed = state.with_status(LoopStatus::Running, at(9));
        assert_eq!(resumed.status, LoopStatus::Running);
        assert_eq!(resumed.stop_reason, None);
        assert_eq!(resumed.started_at, at(0));
    }
}
