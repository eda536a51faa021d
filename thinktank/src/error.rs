//! Error taxonomy for the idea loop.
//!
//! - [`BackendError`]: a single completion call failed. Always recovered by the
//!   cycle as a misfire; never escapes [`crate::cycle`].
//! - [`StoreError`]: a durable write or read failed. Fatal to the run.
//! - [`ConfigError`]: settings are missing or invalid. Fatal at startup.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of one request/response exchange with the completion backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
    #[error("backend returned an empty completion")]
    Empty,
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

/// Failure of the idea store, index store, or persisted loop state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("idea slug '{0}' already exists")]
    SlugTaken(String),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse loop state {path}: {source}")]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Invalid or missing settings detected before any state is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("task file not found: {0}")]
    MissingTask(PathBuf),
    #[error("task file {0} is empty")]
    EmptyTask(PathBuf),
    #[error("no model loaded at {base_url}: {reason}")]
    NoModel { base_url: String, reason: String },
    #[error("build http client: {0}")]
    HttpClient(String),
}

/// Fatal outcome of the orchestrator.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("render prompt: {0}")]
    Prompt(#[from] minijinja::Error),
}
