//! Accepted ideas and their markdown rendering.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::types::Candidate;

/// An accepted idea. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Idea {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub full_text: String,
    pub accepted_at: DateTime<Utc>,
}

impl Idea {
    /// Build the idea for an accepted candidate under an already-disambiguated slug.
    pub fn accept(candidate: &Candidate, slug: String, accepted_at: DateTime<Utc>) -> Self {
        let full_text = render_markdown(candidate, &slug, accepted_at);
        Self {
            slug,
            title: candidate.title.clone(),
            summary: candidate.summary.clone(),
            full_text,
            accepted_at,
        }
    }
}

fn render_markdown(candidate: &Candidate, slug: &str, accepted_at: DateTime<Utc>) -> String {
    let mut buf = String::new();
    buf.push_str("---\n");
    buf.push_str(&format!("title: {}\n", quote_scalar(&candidate.title)));
    buf.push_str(&format!("slug: {slug}\n"));
    buf.push_str(&format!(
        "generated: {}\n",
        accepted_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    buf.push_str("accepted: true\n");
    buf.push_str("---\n\n");
    buf.push_str(&format!("# {}\n\n", candidate.title));
    buf.push_str(&format!("## Summary\n{}\n\n", candidate.summary));
    buf.push_str(&format!("## Approach\n{}\n", candidate.approach));
    if let Some(sketch) = &candidate.code_sketch {
        buf.push_str(&format!("\n## Code Sketch\n{sketch}\n"));
    }
    buf
}

/// Double-quoted frontmatter scalar, so titles containing `:` or `#` stay valid.
fn quote_scalar(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
