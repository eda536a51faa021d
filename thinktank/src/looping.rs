//! The orchestrator: runs cycles until a stop condition holds.
//!
//! Cycles run strictly one after another. The loop state is persisted after
//! every resolved cycle and on every status change, so the file on disk never
//! reflects a half-completed cycle. Interruption is honored only between
//! cycles and during the inter-cycle pause.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::core::loop_state::LoopState;
use crate::core::saturation::{SaturationDecision, assess};
use crate::core::stop::stop_condition;
use crate::core::types::{LoopLimits, LoopStatus, StopReason};
use crate::cycle::{CycleContext, CycleEvent, run_cycle};
use crate::error::LoopError;
use crate::io::completion::{CompletionClient, RoleConfig};
use crate::io::idea_store::IdeaStore;
use crate::io::index_store::IndexStore;
use crate::io::interrupt::Interrupt;
use crate::io::loop_state::write_loop_state;
use crate::io::prompt::PromptEngine;
use crate::start::start_or_resume;

/// Immutable inputs for one run.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub task: String,
    pub limits: LoopLimits,
    pub generator: RoleConfig,
    pub reviewer: RoleConfig,
    pub state_path: PathBuf,
}

/// Progress notifications for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// A persisted run was found and is being continued.
    Resumed { deployed: u32, cycles: u32 },
    CycleStarted { cycle: u32 },
    Cycle { cycle: u32, event: CycleEvent },
    /// The cycle exhausted its retries; pausing before the next one.
    Sleeping { seconds: u64, consecutive_failures: u32 },
    Stopped { reason: StopReason },
}

/// Summary of a `run_loop` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Final persisted state.
    pub state: LoopState,
    pub resumed: bool,
    /// Cycles resolved during this invocation.
    pub cycles_run: u32,
    pub stop: StopReason,
}

/// Run cycles until the idea quota, runtime budget, saturation or an
/// interruption stops the loop.
///
/// Only store failures (and template bugs) end the run with an error; the
/// persisted state is then left as it was before the failing write.
#[instrument(skip_all, fields(state_path = %config.state_path.display()))]
pub fn run_loop<C, I, X, F>(
    config: &LoopConfig,
    client: &C,
    index: &I,
    ideas: &X,
    interrupt: &Interrupt,
    mut on_event: F,
) -> Result<LoopOutcome, LoopError>
where
    C: CompletionClient,
    I: IndexStore,
    X: IdeaStore,
    F: FnMut(LoopEvent),
{
    let start = start_or_resume(&config.state_path, Utc::now())?;
    let resumed = start.resumed;
    let mut state = start.state;
    if resumed {
        on_event(LoopEvent::Resumed {
            deployed: state.deployed_count,
            cycles: state.cycle_count,
        });
    }

    let prompts = PromptEngine::new();
    let ctx = CycleContext {
        task: &config.task,
        generator: &config.generator,
        reviewer: &config.reviewer,
        max_retries: config.limits.max_retries,
        prompts: &prompts,
    };
    let mut cycles_run = 0u32;

    loop {
        let now = Utc::now();
        let stop = stop_condition(&state, &config.limits, now)
            .or_else(|| interrupt.is_requested().then_some(StopReason::Interrupted));
        if let Some(reason) = stop {
            state = state.stopped(reason, now);
            write_loop_state(&config.state_path, &state)?;
            info!(reason = %reason, deployed = state.deployed_count, "loop stopped");
            on_event(LoopEvent::Stopped { reason });
            return Ok(LoopOutcome {
                state,
                resumed,
                cycles_run,
                stop: reason,
            });
        }

        if state.status != LoopStatus::Running {
            state = state.with_status(LoopStatus::Running, now);
            write_loop_state(&config.state_path, &state)?;
        }

        let cycle = state.cycle_count + 1;
        debug!(cycle, "cycle starting");
        on_event(LoopEvent::CycleStarted { cycle });
        let outcome = run_cycle(&ctx, client, index, ideas, |event| {
            on_event(LoopEvent::Cycle { cycle, event });
        })?;
        cycles_run += 1;

        let now = Utc::now();
        state = state.after_cycle(&outcome, now);
        let decision = assess(
            state.consecutive_failures,
            config.limits.max_consecutive_failures,
        );
        let pause = decision == SaturationDecision::SleepThenRetry && !interrupt.is_requested();
        if pause {
            state = state.with_status(LoopStatus::Sleeping, now);
        }
        write_loop_state(&config.state_path, &state)?;

        if pause {
            let seconds = config.limits.retry_sleep.as_secs();
            info!(
                seconds,
                consecutive_failures = state.consecutive_failures,
                "cycle exhausted; pausing"
            );
            on_event(LoopEvent::Sleeping {
                seconds,
                consecutive_failures: state.consecutive_failures,
            });
            interrupt.pause(config.limits.retry_sleep);
        }
    }
}
