//! Shared deterministic types for the idea loop.
//!
//! These types define stable contracts between the cycle, the orchestrator and
//! the persisted state. They must not depend on external state or I/O.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle status recorded in the persisted loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    Running,
    Sleeping,
    Stopped,
}

impl LoopStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopStatus::Running => "RUNNING",
            LoopStatus::Sleeping => "SLEEPING",
            LoopStatus::Stopped => "STOPPED",
        }
    }
}

/// Why the loop stopped. Persisted as its human-readable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    #[serde(rename = "idea quota reached")]
    IdeaQuotaReached,
    #[serde(rename = "runtime budget exhausted")]
    RuntimeBudgetExhausted,
    #[serde(rename = "idea space saturated")]
    IdeaSpaceSaturated,
    #[serde(rename = "interrupted")]
    Interrupted,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::IdeaQuotaReached => "idea quota reached",
            StopReason::RuntimeBudgetExhausted => "runtime budget exhausted",
            StopReason::IdeaSpaceSaturated => "idea space saturated",
            StopReason::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the per-cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Loading,
    Targeting,
    Deployed,
    Misfire,
    Exhausted,
}

impl CyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CyclePhase::Loading => "LOADING",
            CyclePhase::Targeting => "TARGETING",
            CyclePhase::Deployed => "DEPLOYED",
            CyclePhase::Misfire => "MISFIRE",
            CyclePhase::Exhausted => "EXHAUSTED",
        }
    }
}

/// Strictly typed view of a free-text model response.
///
/// Raw completion text is parsed into this immediately after the call returns;
/// nothing downstream inspects the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutput<T> {
    Parsed(T),
    Unparseable,
}

/// One candidate idea proposed by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// One-line summary used as the index entry.
    pub summary: String,
    pub approach: String,
    pub code_sketch: Option<String>,
}

/// Binary reviewer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Parsed reviewer response. `reason` is always present on `Reject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub verdict: Verdict,
    pub reason: Option<String>,
}

/// Why a single attempt inside a cycle did not deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MisfireReason {
    /// The reviewer rejected the candidate.
    Rejected(String),
    MalformedGeneration,
    MalformedReview,
    /// The completion client failed at either role.
    BackendUnavailable { detail: String },
}

impl MisfireReason {
    /// Guidance handed to the next generation attempt, if any.
    ///
    /// Backend failures say nothing about the candidate, so they carry no
    /// guidance and the previous reason (if any) stays in effect.
    pub fn guidance(&self) -> Option<String> {
        match self {
            MisfireReason::BackendUnavailable { .. } => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for MisfireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MisfireReason::Rejected(reason) => f.write_str(reason),
            MisfireReason::MalformedGeneration => f.write_str("malformed generation output"),
            MisfireReason::MalformedReview => f.write_str("malformed review output"),
            MisfireReason::BackendUnavailable { .. } => f.write_str("backend unavailable"),
        }
    }
}

/// Transient per-attempt bookkeeping; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleAttempt {
    /// 1-indexed, bounded by `max_retries`.
    pub attempt_number: u32,
    /// Most recent rejection reason, fed back to the generator.
    pub rejection_reason: Option<String>,
}

impl CycleAttempt {
    pub fn first() -> Self {
        Self {
            attempt_number: 1,
            rejection_reason: None,
        }
    }

    /// The attempt that follows a misfire.
    pub fn next(self, misfire: &MisfireReason) -> Self {
        Self {
            attempt_number: self.attempt_number + 1,
            rejection_reason: misfire.guidance().or(self.rejection_reason),
        }
    }
}

/// How a cycle resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResolution {
    Deployed { slug: String },
    Exhausted,
}

/// Result of one full cycle, consumed by the loop-state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub resolution: CycleResolution,
    /// Misfired attempts during this cycle (rejections, malformed output, backend errors).
    pub misfires: u32,
}

impl CycleOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self.resolution, CycleResolution::Deployed { .. })
    }
}

/// Run-wide limits taken from the configuration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopLimits {
    pub max_ideas: u32,
    pub max_runtime_hours: f64,
    pub max_retries: u32,
    pub max_consecutive_failures: u32,
    pub retry_sleep: Duration,
}
