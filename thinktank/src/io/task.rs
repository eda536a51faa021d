//! Task description file helpers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::error::{BackendError, ConfigError};
use crate::io::completion::{CompletionClient, RoleConfig};
use crate::io::prompt::TASK_FORMATTER_SYSTEM;

/// Starter task written by `think-tank init`.
pub const TASK_TEMPLATE: &str = "# Task

Describe what you want to brainstorm about.

## Constraints
- Keep ideas grounded in tools you can actually use.

## Scoring (for the reviewer)
An idea is TOO SIMILAR if it uses the same core tool and the same core technique as an existing idea.
An idea is NOVEL ENOUGH if it changes the tool, the technique, or the overall approach.
";

const FORMATTER_TEMPERATURE: f64 = 0.3;

/// Read the task description. Missing or blank files are configuration errors.
pub fn read_task(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingTask(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let task = contents.trim();
    if task.is_empty() {
        return Err(ConfigError::EmptyTask(path.to_path_buf()));
    }
    debug!(path = %path.display(), bytes = task.len(), "task loaded");
    Ok(task.to_string())
}

/// Write a task file, refusing to replace an existing one unless `force` is set.
pub fn write_task(path: &Path, contents: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut buf = contents.trim_end().to_string();
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

/// Turn a free-form description into a structured task via the model.
pub fn format_task<C: CompletionClient>(
    client: &C,
    description: &str,
) -> Result<String, BackendError> {
    let role = RoleConfig {
        system_prompt: TASK_FORMATTER_SYSTEM.to_string(),
        temperature: FORMATTER_TEMPERATURE,
    };
    client.complete(&role, description.trim())
}
