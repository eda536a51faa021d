//! Test-only helpers: scripted collaborators and a temp workspace.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::error::{BackendError, StoreError};
use crate::io::completion::{CompletionClient, RoleConfig};
use crate::io::idea_store::{IdeaDir, IdeaStore};
use crate::io::index_store::{IndexEntry, IndexStore, MarkdownIndex};
use crate::io::interrupt::Interrupt;

/// A recorded completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCall {
    pub system_prompt: String,
    pub temperature: f64,
    pub user_content: String,
}

/// Completion client that replays a fixed queue of responses.
///
/// Once the queue is empty every call fails with a transport error.
pub struct ScriptedClient {
    responses: RefCell<VecDeque<Result<String, BackendError>>>,
    calls: RefCell<Vec<ScriptedCall>>,
    interrupt_after: Cell<Option<(usize, Interrupt)>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
            interrupt_after: Cell::new(None),
        }
    }

    /// Raise `interrupt` once `calls` requests have been served.
    pub fn interrupt_after(self, calls: usize, interrupt: &Interrupt) -> Self {
        self.interrupt_after.set(Some((calls, interrupt.clone())));
        self
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, role: &RoleConfig, user_content: &str) -> Result<String, BackendError> {
        self.calls.borrow_mut().push(ScriptedCall {
            system_prompt: role.system_prompt.clone(),
            temperature: role.temperature,
            user_content: user_content.to_string(),
        });
        let served = self.calls.borrow().len();
        if let Some((after, interrupt)) = self.interrupt_after.take() {
            if served >= after {
                interrupt.request();
            } else {
                self.interrupt_after.set(Some((after, interrupt)));
            }
        }
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("script exhausted".to_string())))
    }
}

/// Well-formed generator output.
pub fn generation(title: &str, summary: &str) -> String {
    format!(
        "TITLE: {title}\nSUMMARY: {summary}\nAPPROACH: Build {title} step by step.\nCODE_SKETCH:\nprint('{title}')\n"
    )
}

pub fn accept() -> String {
    "DECISION: ACCEPT\nREASON: Nothing like it in the index.".to_string()
}

pub fn reject(reason: &str) -> String {
    format!("DECISION: REJECT\nREASON: {reason}")
}

/// Index store whose appends always fail; reads delegate to `inner`.
pub struct FailingIndex<'a> {
    inner: &'a MarkdownIndex,
}

impl<'a> FailingIndex<'a> {
    pub fn new(inner: &'a MarkdownIndex) -> Self {
        Self { inner }
    }
}

impl IndexStore for FailingIndex<'_> {
    fn read_all(&self) -> Result<Vec<IndexEntry>, StoreError> {
        self.inner.read_all()
    }

    fn append(&self, _slug: &str, _summary: &str) -> Result<(), StoreError> {
        Err(StoreError::io(
            "append index",
            self.inner.path(),
            std::io::Error::other("disk full"),
        ))
    }
}

/// Idea store whose writes always fail.
pub struct FailingIdeas;

impl IdeaStore for FailingIdeas {
    fn exists(&self, _slug: &str) -> bool {
        false
    }

    fn write(&self, slug: &str, _full_text: &str) -> Result<(), StoreError> {
        Err(StoreError::io(
            "create idea",
            format!("ideas/idea_{slug}.md"),
            std::io::Error::other("read-only filesystem"),
        ))
    }

    fn discard(&self, _slug: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Temporary directory laid out like a real run.
pub struct TestWorkspace {
    _temp: TempDir,
    pub ideas: IdeaDir,
    pub index: MarkdownIndex,
    pub state_path: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> std::io::Result<Self> {
        let temp = tempfile::tempdir()?;
        let ideas = IdeaDir::new(temp.path().join("ideas"));
        let index = MarkdownIndex::new(temp.path().join("ideas_index.md"));
        let state_path = temp.path().join(".loop_state.json");
        ideas.ensure_exists().map_err(std::io::Error::other)?;
        index.ensure_exists().map_err(std::io::Error::other)?;
        Ok(Self {
            _temp: temp,
            ideas,
            index,
            state_path,
        })
    }

    pub fn index_slugs(&self) -> Vec<String> {
        self.index
            .read_all()
            .expect("read index")
            .into_iter()
            .map(|entry| entry.slug)
            .collect()
    }

    pub fn idea_count(&self) -> usize {
        fs::read_dir(self.ideas.dir())
            .expect("read ideas dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".md"))
            .count()
    }

    pub fn read_idea(&self, slug: &str) -> String {
        fs::read_to_string(self.ideas.path_for(slug)).expect("read idea")
    }
}
