//! Prompt rendering for the generator, reviewer and task formatter roles.
//!
//! The task description is opaque: it is passed verbatim into the templates
//! and never parsed.

use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::types::Candidate;
use crate::io::index_store::IndexEntry;

pub const GENERATOR_SYSTEM: &str = include_str!("prompts/generator_system.md");
pub const REVIEWER_SYSTEM: &str = include_str!("prompts/reviewer_system.md");
pub const TASK_FORMATTER_SYSTEM: &str = include_str!("prompts/task_formatter_system.md");

const GENERATOR_TEMPLATE: &str = include_str!("prompts/generator.md");
const REVIEWER_TEMPLATE: &str = include_str!("prompts/reviewer.md");

/// Candidate fields exposed to the reviewer template.
#[derive(Debug, Clone, Serialize)]
struct CandidateContext<'a> {
    title: &'a str,
    summary: &'a str,
    approach: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("generator", GENERATOR_TEMPLATE)
            .expect("generator template should be valid");
        env.add_template("reviewer", REVIEWER_TEMPLATE)
            .expect("reviewer template should be valid");
        Self { env }
    }

    /// User prompt for the generator. `rejection` is the most recent misfire reason.
    pub fn render_generator(
        &self,
        task: &str,
        index: &[IndexEntry],
        rejection: Option<&str>,
    ) -> Result<String, minijinja::Error> {
        let template = self.env.get_template("generator")?;
        let rendered = template.render(context! {
            task => task.trim(),
            index => render_index(index),
            rejection => rejection.map(str::trim).filter(|r| !r.is_empty()),
        })?;
        debug!(bytes = rendered.len(), retry = rejection.is_some(), "rendered generator prompt");
        Ok(rendered)
    }

    /// User prompt for the reviewer.
    pub fn render_reviewer(
        &self,
        index: &[IndexEntry],
        candidate: &Candidate,
    ) -> Result<String, minijinja::Error> {
        let template = self.env.get_template("reviewer")?;
        let rendered = template.render(context! {
            index => render_index(index),
            candidate => CandidateContext {
                title: &candidate.title,
                summary: &candidate.summary,
                approach: &candidate.approach,
            },
        })?;
        debug!(bytes = rendered.len(), "rendered reviewer prompt");
        Ok(rendered)
    }
}

/// Condensed index context: one `- [slug]: summary` line per accepted idea.
pub fn render_index(entries: &[IndexEntry]) -> String {
    entries
        .iter()
        .map(IndexEntry::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slug: &str, summary: &str) -> IndexEntry {
        IndexEntry {
            slug: slug.to_string(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn generator_prompt_marks_first_idea() {
        let prompt = PromptEngine::new()
            .render_generator("Sort visualisations.", &[], None)
            .expect("render");
        assert!(prompt.starts_with("## Task\nSort visualisations.\n"));
        assert!(prompt.contains("(none yet — this is the first idea)"));
        assert!(!prompt.contains("PREVIOUS ATTEMPT REJECTED"));
    }

    #[test]
    fn generator_prompt_lists_index_and_rejection() {
        let index = vec![entry("bead-sort", "Falling beads."), entry("spiral", "Spiral bars.")];
        let prompt = PromptEngine::new()
            .render_generator("task", &index, Some("too close to [spiral]"))
            .expect("render");
        assert!(prompt.contains("- [bead-sort]: Falling beads.\n- [spiral]: Spiral bars."));
        assert!(prompt.contains("PREVIOUS ATTEMPT REJECTED: too close to [spiral]"));
        assert!(!prompt.contains("none yet"));
    }

    #[test]
    fn reviewer_prompt_includes_candidate() {
        let candidate = Candidate {
            title: "Sound Sort".to_string(),
            summary: "Sonify swaps.".to_string(),
            approach: "Play a tone per swap.".to_string(),
            code_sketch: None,
        };
        let prompt = PromptEngine::new()
            .render_reviewer(&[], &candidate)
            .expect("render");
        assert!(prompt.contains("(none yet)"));
        assert!(prompt.contains(
            "TITLE: Sound Sort\nSUMMARY: Sonify swaps.\nAPPROACH: Play a tone per swap."
        ));
    }
}
