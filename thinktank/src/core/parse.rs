//! Parsing of free-text model responses into strict typed results.
//!
//! Generator output uses labelled sections (`TITLE:`, `SUMMARY:`, `APPROACH:`,
//! `CODE_SKETCH:`). A label is an upper-case word at the start of a line
//! followed by `:`; its section runs until the next label. `CODE_SKETCH` always
//! runs to the end of the text so code inside it cannot be mistaken for labels.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{Candidate, ModelOutput, Review, Verdict};

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z_]+):\s*(.*)$").expect("valid label regex"));
// Labels may be wrapped in markdown bold: `**DECISION:**` or `**REASON**:`.
static DECISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)DECISION\**\s*:\s*\**\s*(ACCEPT|REJECT)\b").expect("valid decision regex")
});
static REASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*\**\s*REASON\**\s*:\s*\**\s*(.+?)\s*$").expect("valid reason regex")
});
static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>|<thinking>.*?</thinking>").expect("valid reasoning regex")
});
static ANSWER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<answer>\s*|\s*</answer>").expect("valid answer regex"));

const CODE_SKETCH_LABEL: &str = "CODE_SKETCH";
const SUMMARY_FALLBACK_CHARS: usize = 160;

/// Remove chain-of-thought markup emitted by reasoning models.
///
/// `<think>`/`<thinking>` blocks are dropped entirely; `<answer>` tags are
/// unwrapped, keeping their content.
pub fn strip_reasoning(text: &str) -> String {
    let without_thoughts = REASONING_RE.replace_all(text, "");
    ANSWER_TAG_RE
        .replace_all(&without_thoughts, "")
        .trim()
        .to_string()
}

/// Parse generator output into a candidate idea.
///
/// `TITLE` and `APPROACH` are required. A missing `SUMMARY` falls back to the
/// first sentence of the approach.
pub fn parse_generation(raw: &str) -> ModelOutput<Candidate> {
    let sections = split_sections(raw);
    let field = |label: &str| {
        sections
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, body)| body.trim().to_string())
            .filter(|body| !body.is_empty())
    };

    let (Some(title), Some(approach)) = (field("TITLE"), field("APPROACH")) else {
        return ModelOutput::Unparseable;
    };
    let title = one_line(&title);
    let summary = field("SUMMARY")
        .map(|s| one_line(&s))
        .unwrap_or_else(|| first_sentence(&approach));

    ModelOutput::Parsed(Candidate {
        title,
        summary,
        approach,
        code_sketch: field(CODE_SKETCH_LABEL),
    })
}

/// Parse reviewer output into a verdict with an optional reason.
///
/// A missing decision, or a rejection without a reason, is unparseable.
pub fn parse_review(raw: &str) -> ModelOutput<Review> {
    let Some(decision) = DECISION_RE.captures(raw) else {
        return ModelOutput::Unparseable;
    };
    let verdict = if decision[1].eq_ignore_ascii_case("accept") {
        Verdict::Accept
    } else {
        Verdict::Reject
    };
    let reason = REASON_RE
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .filter(|reason| !reason.is_empty());

    if verdict == Verdict::Reject && reason.is_none() {
        return ModelOutput::Unparseable;
    }
    ModelOutput::Parsed(Review { verdict, reason })
}

fn split_sections(raw: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut lines = raw.lines();
    while let Some(line) = lines.next() {
        if let Some(caps) = LABEL_RE.captures(line.trim_end()) {
            let label = caps[1].to_string();
            let mut body = caps[2].to_string();
            if label == CODE_SKETCH_LABEL {
                for rest in lines.by_ref() {
                    body.push('\n');
                    body.push_str(rest);
                }
            }
            sections.push((label, body));
            continue;
        }
        if let Some((_, body)) = sections.last_mut() {
            body.push('\n');
            body.push_str(line);
        }
    }
    sections
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_sentence(text: &str) -> String {
    let flat = one_line(text);
    let end = flat
        .find(". ")
        .map(|idx| idx + 1)
        .unwrap_or(flat.len());
    flat[..end].chars().take(SUMMARY_FALLBACK_CHARS).collect()
}
