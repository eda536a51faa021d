//! Append-only index of accepted idea summaries (`ideas_index.md`).
//!
//! Insertion order is meaningful: it is the chronological context the next
//! generation cycle reads.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::StoreError;

const INDEX_HEADER: &str = "# Ideas Index\n\n";

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[([^\]]+)\]: (.*)$").expect("valid index entry regex"));

/// One accepted idea as seen by future cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub slug: String,
    pub summary: String,
}

impl IndexEntry {
    pub fn to_line(&self) -> String {
        format!("- [{}]: {}", self.slug, self.summary)
    }
}

/// Append-only collection of accepted summaries.
pub trait IndexStore {
    /// All entries in acceptance order.
    fn read_all(&self) -> Result<Vec<IndexEntry>, StoreError>;
    fn append(&self, slug: &str, summary: &str) -> Result<(), StoreError>;
}

/// Markdown-backed index: a header followed by one `- [slug]: summary` line per idea.
#[derive(Debug, Clone)]
pub struct MarkdownIndex {
    path: PathBuf,
}

impl MarkdownIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the index file with its header if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| StoreError::io("create index directory", parent, err))?;
        }
        fs::write(&self.path, INDEX_HEADER)
            .map_err(|err| StoreError::io("create index", &self.path, err))?;
        debug!(path = %self.path.display(), "index created");
        Ok(())
    }
}

impl IndexStore for MarkdownIndex {
    fn read_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|err| StoreError::io("read index", &self.path, err))?;
        Ok(parse_entries(&contents))
    }

    fn append(&self, slug: &str, summary: &str) -> Result<(), StoreError> {
        self.ensure_exists()?;
        let entry = IndexEntry {
            slug: slug.to_string(),
            summary: summary.to_string(),
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|err| StoreError::io("open index", &self.path, err))?;
        writeln!(file, "{}", entry.to_line())
            .and_then(|()| file.sync_data())
            .map_err(|err| StoreError::io("append index", &self.path, err))?;
        debug!(slug, "index entry appended");
        Ok(())
    }
}

fn parse_entries(contents: &str) -> Vec<IndexEntry> {
    contents
        .lines()
        .filter_map(|line| ENTRY_RE.captures(line.trim_end()))
        .map(|caps| IndexEntry {
            slug: caps[1].to_string(),
            summary: caps[2].trim().to_string(),
        })
        .collect()
}
