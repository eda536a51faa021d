//! The cycle state machine: one generator→reviewer round with bounded retries.
//!
//! ```text
//! LOADING → TARGETING → DEPLOYED
//!    ↑          │
//!    └─ MISFIRE ┘   (after max_retries misfires: EXHAUSTED)
//! ```
//!
//! Backend failures, unparseable output and rejections are all misfires: each
//! consumes one attempt, and none of them escapes this module. Only store
//! failures are fatal.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::idea::Idea;
use crate::core::parse::{parse_generation, parse_review};
use crate::core::slug::{slugify, unique_slug};
use crate::core::types::{
    Candidate, CycleAttempt, CycleOutcome, CyclePhase, CycleResolution, MisfireReason,
    ModelOutput, Verdict,
};
use crate::error::LoopError;
use crate::io::completion::{CompletionClient, RoleConfig};
use crate::io::idea_store::IdeaStore;
use crate::io::index_store::{IndexEntry, IndexStore};
use crate::io::prompt::PromptEngine;

/// Inputs that stay fixed across every attempt of a cycle.
pub struct CycleContext<'a> {
    /// Opaque task description passed verbatim to both roles.
    pub task: &'a str,
    pub generator: &'a RoleConfig,
    pub reviewer: &'a RoleConfig,
    pub max_retries: u32,
    pub prompts: &'a PromptEngine,
}

/// Progress notifications emitted while a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    /// Entered `LOADING` or `TARGETING`.
    Phase { attempt: u32, phase: CyclePhase },
    /// The generator produced a parseable candidate.
    Candidate { attempt: u32, title: String },
    Misfire {
        attempt: u32,
        reason: MisfireReason,
    },
    Deployed { slug: String, summary: String },
    Exhausted { attempts: u32 },
}

impl CycleEvent {
    pub fn phase(&self) -> CyclePhase {
        match self {
            CycleEvent::Phase { phase, .. } => *phase,
            CycleEvent::Candidate { .. } => CyclePhase::Loading,
            CycleEvent::Misfire { .. } => CyclePhase::Misfire,
            CycleEvent::Deployed { .. } => CyclePhase::Deployed,
            CycleEvent::Exhausted { .. } => CyclePhase::Exhausted,
        }
    }
}

enum AttemptResult {
    Deployed(String),
    Misfire(MisfireReason),
}

/// Drive one cycle to `DEPLOYED` or `EXHAUSTED`.
///
/// On acceptance the idea artifact is written before its index entry; if the
/// index append fails the artifact is discarded so the two stores never
/// disagree.
#[instrument(skip_all, fields(max_retries = ctx.max_retries))]
pub fn run_cycle<C, I, X, F>(
    ctx: &CycleContext<'_>,
    client: &C,
    index: &I,
    ideas: &X,
    mut on_event: F,
) -> Result<CycleOutcome, LoopError>
where
    C: CompletionClient,
    I: IndexStore,
    X: IdeaStore,
    F: FnMut(CycleEvent),
{
    let mut attempt = CycleAttempt::first();
    let mut misfires = 0u32;

    while attempt.attempt_number <= ctx.max_retries {
        match run_attempt(ctx, client, index, ideas, &attempt, &mut on_event)? {
            AttemptResult::Deployed(slug) => {
                return Ok(CycleOutcome {
                    resolution: CycleResolution::Deployed { slug },
                    misfires,
                });
            }
            AttemptResult::Misfire(reason) => {
                misfires += 1;
                info!(attempt = attempt.attempt_number, reason = %reason, "misfire");
                on_event(CycleEvent::Misfire {
                    attempt: attempt.attempt_number,
                    reason: reason.clone(),
                });
                attempt = attempt.next(&reason);
            }
        }
    }

    info!(attempts = ctx.max_retries, "cycle exhausted");
    on_event(CycleEvent::Exhausted {
        attempts: ctx.max_retries,
    });
    Ok(CycleOutcome {
        resolution: CycleResolution::Exhausted,
        misfires,
    })
}

fn run_attempt<C, I, X, F>(
    ctx: &CycleContext<'_>,
    client: &C,
    index: &I,
    ideas: &X,
    attempt: &CycleAttempt,
    on_event: &mut F,
) -> Result<AttemptResult, LoopError>
where
    C: CompletionClient,
    I: IndexStore,
    X: IdeaStore,
    F: FnMut(CycleEvent),
{
    let number = attempt.attempt_number;

    on_event(CycleEvent::Phase {
        attempt: number,
        phase: CyclePhase::Loading,
    });
    let entries = index.read_all()?;
    let prompt =
        ctx.prompts
            .render_generator(ctx.task, &entries, attempt.rejection_reason.as_deref())?;
    let candidate = match client.complete(ctx.generator, &prompt) {
        Err(err) => {
            warn!(attempt = number, error = %err, "generator call failed");
            return Ok(backend_misfire(err.to_string()));
        }
        Ok(raw) => match parse_generation(&raw) {
            ModelOutput::Parsed(candidate) => candidate,
            ModelOutput::Unparseable => {
                debug!(attempt = number, bytes = raw.len(), "generator output unparseable");
                return Ok(AttemptResult::Misfire(MisfireReason::MalformedGeneration));
            }
        },
    };
    on_event(CycleEvent::Candidate {
        attempt: number,
        title: candidate.title.clone(),
    });

    on_event(CycleEvent::Phase {
        attempt: number,
        phase: CyclePhase::Targeting,
    });
    let prompt = ctx.prompts.render_reviewer(&entries, &candidate)?;
    let review = match client.complete(ctx.reviewer, &prompt) {
        Err(err) => {
            warn!(attempt = number, error = %err, "reviewer call failed");
            return Ok(backend_misfire(err.to_string()));
        }
        Ok(raw) => match parse_review(&raw) {
            ModelOutput::Parsed(review) => review,
            ModelOutput::Unparseable => {
                debug!(attempt = number, bytes = raw.len(), "reviewer output unparseable");
                return Ok(AttemptResult::Misfire(MisfireReason::MalformedReview));
            }
        },
    };

    match review.verdict {
        Verdict::Reject => {
            let reason = review.reason.unwrap_or_default();
            Ok(AttemptResult::Misfire(MisfireReason::Rejected(reason)))
        }
        Verdict::Accept => {
            let slug = deploy(&candidate, &entries, index, ideas)?;
            on_event(CycleEvent::Deployed {
                slug: slug.clone(),
                summary: candidate.summary.clone(),
            });
            Ok(AttemptResult::Deployed(slug))
        }
    }
}

fn backend_misfire(detail: String) -> AttemptResult {
    AttemptResult::Misfire(MisfireReason::BackendUnavailable { detail })
}

/// Commit an accepted candidate: artifact first, then its index entry.
fn deploy<I: IndexStore, X: IdeaStore>(
    candidate: &Candidate,
    entries: &[IndexEntry],
    index: &I,
    ideas: &X,
) -> Result<String, LoopError> {
    let base = slugify(&candidate.title);
    let slug = unique_slug(&base, |s| {
        ideas.exists(s) || entries.iter().any(|entry| entry.slug == s)
    });
    let idea = Idea::accept(candidate, slug, Utc::now());

    ideas.write(&idea.slug, &idea.full_text)?;
    if let Err(err) = index.append(&idea.slug, &idea.summary) {
        if let Err(cleanup) = ideas.discard(&idea.slug) {
            warn!(
                slug = %idea.slug,
                error = %cleanup,
                "could not discard idea after index failure"
            );
        }
        return Err(err.into());
    }
    info!(slug = %idea.slug, "idea deployed");
    Ok(idea.slug)
}
