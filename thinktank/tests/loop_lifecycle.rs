//! Loop-level tests driving `run_loop` end to end against scripted backends.
//!
//! Every test checks the store invariant at the end: the persisted deployed
//! count, the number of index entries and the number of idea artifacts agree.

use std::time::Duration;

use chrono::Utc;
use thinktank::core::loop_state::LoopState;
use thinktank::core::types::{LoopLimits, LoopStatus, StopReason};
use thinktank::error::{BackendError, LoopError, StoreError};
use thinktank::io::completion::RoleConfig;
use thinktank::io::interrupt::Interrupt;
use thinktank::io::loop_state::{load_loop_state, write_loop_state};
use thinktank::looping::{LoopConfig, LoopEvent, LoopOutcome, run_loop};
use thinktank::test_support::{
    FailingIdeas, ScriptedClient, TestWorkspace, accept, generation, reject,
};

fn limits(max_ideas: u32, max_retries: u32, max_failures: u32) -> LoopLimits {
    LoopLimits {
        max_ideas,
        max_runtime_hours: 8.0,
        max_retries,
        max_consecutive_failures: max_failures,
        retry_sleep: Duration::ZERO,
    }
}

fn loop_config(ws: &TestWorkspace, limits: LoopLimits) -> LoopConfig {
    LoopConfig {
        task: "Ways to teach recursion to children.".to_string(),
        limits,
        generator: RoleConfig {
            system_prompt: "You generate ideas.".to_string(),
            temperature: 0.95,
        },
        reviewer: RoleConfig {
            system_prompt: "You review ideas.".to_string(),
            temperature: 0.2,
        },
        state_path: ws.state_path.clone(),
    }
}

fn run(
    ws: &TestWorkspace,
    limits: LoopLimits,
    client: &ScriptedClient,
    interrupt: &Interrupt,
) -> (LoopOutcome, Vec<LoopEvent>) {
    let mut events = Vec::new();
    let outcome = run_loop(
        &loop_config(ws, limits),
        client,
        &ws.index,
        &ws.ideas,
        interrupt,
        |event| events.push(event),
    )
    .expect("run loop");
    (outcome, events)
}

fn assert_stores_agree(ws: &TestWorkspace) {
    let state = load_loop_state(&ws.state_path)
        .expect("load state")
        .expect("state present");
    let deployed = state.deployed_count as usize;
    assert_eq!(ws.index_slugs().len(), deployed, "index entries");
    assert_eq!(ws.idea_count(), deployed, "idea artifacts");
}

/// Quota of two with one rejection in the second cycle.
///
/// ```text
/// cycle 1: Ink Flow → ACCEPT
/// cycle 2: Sound Map → REJECT, Paper Fold → ACCEPT
/// ```
#[test]
fn quota_reached_with_retry_in_second_cycle() {
    let ws = TestWorkspace::new().expect("workspace");
    let client = ScriptedClient::new(vec![
        Ok(generation("Ink Flow", "Trace recursion with ink.")),
        Ok(accept()),
        Ok(generation("Sound Map", "Hear the call stack.")),
        Ok(reject("Same tool as an existing idea.")),
        Ok(generation("Paper Fold", "Fold paper into fractals.")),
        Ok(accept()),
    ]);

    let (outcome, events) = run(&ws, limits(2, 3, 10), &client, &Interrupt::new());

    assert_eq!(outcome.stop, StopReason::IdeaQuotaReached);
    assert!(!outcome.resumed);
    assert_eq!(outcome.cycles_run, 2);
    let state = &outcome.state;
    assert_eq!(state.deployed_count, 2);
    assert_eq!(state.misfire_count, 1);
    assert_eq!(state.cycle_count, 2);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.status, LoopStatus::Stopped);
    assert_eq!(state.stop_reason, Some(StopReason::IdeaQuotaReached));

    assert_eq!(ws.index_slugs(), vec!["ink-flow", "paper-fold"]);
    assert!(ws.read_idea("paper-fold").contains("# Paper Fold"));
    assert_stores_agree(&ws);

    let calls = client.calls();
    assert_eq!(calls.len(), 6);
    for (position, call) in calls.iter().enumerate() {
        let (prompt, temperature) = if position % 2 == 0 {
            ("You generate ideas.", 0.95)
        } else {
            ("You review ideas.", 0.2)
        };
        assert_eq!(call.system_prompt, prompt, "call {position}");
        assert_eq!(call.temperature, temperature, "call {position}");
    }
    assert!(!calls[2].user_content.contains("PREVIOUS ATTEMPT REJECTED"));
    assert!(calls[2].user_content.contains("- [ink-flow]: Trace recursion with ink."));
    assert!(
        calls[4]
            .user_content
            .contains("PREVIOUS ATTEMPT REJECTED: Same tool as an existing idea.")
    );

    assert_eq!(
        events.last(),
        Some(&LoopEvent::Stopped {
            reason: StopReason::IdeaQuotaReached
        })
    );
}

#[test]
fn single_exhausted_cycle_saturates_when_threshold_is_one() {
    let ws = TestWorkspace::new().expect("workspace");
    let client = ScriptedClient::new(vec![
        Ok(generation("One", "first")),
        Ok(reject("dup")),
        Ok(generation("Two", "second")),
        Ok(reject("dup")),
        Ok(generation("Three", "third")),
        Ok(reject("dup")),
    ]);

    let (outcome, events) = run(&ws, limits(5, 3, 1), &client, &Interrupt::new());

    assert_eq!(outcome.stop, StopReason::IdeaSpaceSaturated);
    assert_eq!(outcome.state.deployed_count, 0);
    assert_eq!(outcome.state.misfire_count, 3);
    assert_eq!(outcome.state.cycle_count, 1);
    assert_eq!(client.remaining(), 0);
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, LoopEvent::Sleeping { .. })),
        "no pause once saturated"
    );
    assert_eq!(ws.idea_count(), 0);
    assert_stores_agree(&ws);
}

#[test]
fn consecutive_exhausted_cycles_stop_without_further_attempts() {
    let ws = TestWorkspace::new().expect("workspace");
    let client = ScriptedClient::new(vec![
        Ok(generation("A", "a")),
        Ok(reject("dup")),
        Err(BackendError::Timeout),
        Ok("no labels at all".to_string()),
        Ok(generation("Never Reached", "unused")),
        Ok(accept()),
    ]);

    let (outcome, events) = run(&ws, limits(5, 1, 3), &client, &Interrupt::new());

    assert_eq!(outcome.stop, StopReason::IdeaSpaceSaturated);
    assert_eq!(outcome.state.cycle_count, 3);
    assert_eq!(outcome.state.consecutive_failures, 3);
    assert_eq!(outcome.state.misfire_count, 3);
    assert_eq!(client.remaining(), 2, "no fourth cycle");
    let sleeps = events
        .iter()
        .filter(|event| matches!(event, LoopEvent::Sleeping { .. }))
        .count();
    assert_eq!(sleeps, 2);
    assert_stores_agree(&ws);
}

#[test]
fn interrupted_run_resumes_without_duplicates() {
    let ws = TestWorkspace::new().expect("workspace");
    let interrupt = Interrupt::new();
    let first = ScriptedClient::new(vec![
        Ok(generation("Stack Cups", "Nest cups like frames.")),
        Ok(accept()),
        Ok(generation("Unused", "should not be requested")),
    ])
    .interrupt_after(2, &interrupt);

    let (outcome, _) = run(&ws, limits(3, 3, 10), &first, &interrupt);

    assert_eq!(outcome.stop, StopReason::Interrupted);
    assert_eq!(outcome.state.deployed_count, 1);
    assert_eq!(first.remaining(), 1, "in-flight cycle finishes, next one never starts");
    let persisted = load_loop_state(&ws.state_path)
        .expect("load")
        .expect("state");
    assert_eq!(persisted.status, LoopStatus::Stopped);
    assert_eq!(persisted.stop_reason, Some(StopReason::Interrupted));
    let started_at = persisted.started_at;
    assert_stores_agree(&ws);

    let second = ScriptedClient::new(vec![
        Ok(generation("Mirror Hall", "Reflections within reflections.")),
        Ok(accept()),
        Ok(generation("Story Loop", "A story that tells itself.")),
        Ok(accept()),
    ]);
    let (outcome, events) = run(&ws, limits(3, 3, 10), &second, &Interrupt::new());

    assert!(outcome.resumed);
    assert_eq!(
        events.first(),
        Some(&LoopEvent::Resumed {
            deployed: 1,
            cycles: 1
        })
    );
    assert_eq!(outcome.stop, StopReason::IdeaQuotaReached);
    assert_eq!(outcome.cycles_run, 2);
    assert_eq!(outcome.state.deployed_count, 3);
    assert_eq!(outcome.state.cycle_count, 3);
    assert_eq!(outcome.state.started_at, started_at);
    assert_eq!(
        ws.index_slugs(),
        vec!["stack-cups", "mirror-hall", "story-loop"]
    );
    assert_stores_agree(&ws);
}

#[test]
fn stopped_run_restarted_at_quota_stops_immediately() {
    let ws = TestWorkspace::new().expect("workspace");
    let client = ScriptedClient::new(vec![Ok(generation("Only", "one")), Ok(accept())]);
    run(&ws, limits(1, 3, 10), &client, &Interrupt::new());

    let idle = ScriptedClient::new(vec![]);
    let (outcome, _) = run(&ws, limits(1, 3, 10), &idle, &Interrupt::new());

    assert!(outcome.resumed);
    assert_eq!(outcome.stop, StopReason::IdeaQuotaReached);
    assert_eq!(outcome.cycles_run, 0);
    assert!(idle.calls().is_empty());
    assert_stores_agree(&ws);
}

#[test]
fn runtime_budget_is_measured_from_original_start() {
    let ws = TestWorkspace::new().expect("workspace");
    let started = Utc::now() - chrono::Duration::hours(9);
    write_loop_state(&ws.state_path, &LoopState::fresh(started)).expect("seed state");
    let client = ScriptedClient::new(vec![]);

    let (outcome, _) = run(&ws, limits(5, 3, 10), &client, &Interrupt::new());

    assert!(outcome.resumed);
    assert_eq!(outcome.stop, StopReason::RuntimeBudgetExhausted);
    assert!(client.calls().is_empty());
    assert_eq!(outcome.state.started_at, started);
    assert_stores_agree(&ws);
}

#[test]
fn store_failure_is_fatal_and_leaves_state_untouched() {
    let ws = TestWorkspace::new().expect("workspace");
    let client = ScriptedClient::new(vec![
        Ok(generation("Doomed", "never stored")),
        Ok(accept()),
    ]);

    let result = run_loop(
        &loop_config(&ws, limits(3, 3, 10)),
        &client,
        &ws.index,
        &FailingIdeas,
        &Interrupt::new(),
        |_| {},
    );

    assert!(matches!(result, Err(LoopError::Store(StoreError::Io { .. }))));
    let persisted = load_loop_state(&ws.state_path)
        .expect("load")
        .expect("state");
    assert_eq!(persisted.cycle_count, 0);
    assert_eq!(persisted.deployed_count, 0);
    assert_eq!(persisted.status, LoopStatus::Running);
    assert!(ws.index_slugs().is_empty());
}

#[test]
fn repeated_titles_get_distinct_slugs() {
    let ws = TestWorkspace::new().expect("workspace");
    let client = ScriptedClient::new(vec![
        Ok(generation("Echo", "first echo")),
        Ok(accept()),
        Ok(generation("Echo", "second echo")),
        Ok(accept()),
    ]);

    let (outcome, _) = run(&ws, limits(2, 3, 10), &client, &Interrupt::new());

    assert_eq!(outcome.state.deployed_count, 2);
    assert_eq!(ws.index_slugs(), vec!["echo", "echo-2"]);
    assert!(ws.read_idea("echo-2").contains("second echo"));
    assert_stores_agree(&ws);
}
