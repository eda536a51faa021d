//! Saturation policy: decides what follows a resolved cycle.

/// What the orchestrator should do next, given consecutive cycle failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaturationDecision {
    /// The last cycle deployed; start the next one straight away.
    Proceed,
    /// The last cycle exhausted its retries; pause, then try a fresh cycle.
    SleepThenRetry,
    /// Too many exhausted cycles in a row; the idea space is saturated.
    Stop,
}

/// Pure function of the failure streak and its configured ceiling.
///
/// This is the only place `consecutive_failures` is interpreted.
pub fn assess(consecutive_failures: u32, max_consecutive_failures: u32) -> SaturationDecision {
    if consecutive_failures >= max_consecutive_failures {
        SaturationDecision::Stop
    } else if consecutive_failures == 0 {
        SaturationDecision::Proceed
    } else {
        SaturationDecision::SleepThenRetry
    }
}
