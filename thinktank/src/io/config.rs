//! Configuration stored in `think-tank.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::LoopLimits;
use crate::error::ConfigError;
use crate::io::completion::RoleConfig;
use crate::io::prompt::{GENERATOR_SYSTEM, REVIEWER_SYSTEM};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "think-tank.toml";

/// Upper bound for `limits.retry_sleep_seconds` (one day).
pub const MAX_RETRY_SLEEP_SECONDS: u64 = 24 * 60 * 60;

/// Run configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields fall back to
/// defaults; a missing file yields `ThinkTankConfig::default()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ThinkTankConfig {
    pub backend: BackendConfig,
    pub limits: LimitsConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Model id. Empty means: use the first model the server reports.
    pub model: String,
    /// OpenAI-compatible base URL (LM Studio, Ollama, ...).
    pub base_url: String,
    /// Environment variable holding an optional bearer token.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    pub generator_temperature: f64,
    pub reviewer_temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ideas: u32,
    pub max_runtime_hours: f64,
    /// Attempts per cycle before it resolves as exhausted.
    pub max_retries: u32,
    /// Exhausted cycles in a row before the idea space counts as saturated.
    pub max_consecutive_failures: u32,
    pub retry_sleep_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub task_file: PathBuf,
    pub ideas_dir: PathBuf,
    pub index_file: PathBuf,
    pub state_file: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: "http://localhost:1234/v1".to_string(),
            api_key_env: "LM_STUDIO_API_KEY".to_string(),
            request_timeout_secs: 300,
            generator_temperature: 0.95,
            reviewer_temperature: 0.2,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ideas: 50,
            max_runtime_hours: 8.0,
            max_retries: 3,
            max_consecutive_failures: 10,
            retry_sleep_seconds: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            task_file: PathBuf::from("task.md"),
            ideas_dir: PathBuf::from("ideas"),
            index_file: PathBuf::from("ideas_index.md"),
            state_file: PathBuf::from(".loop_state.json"),
        }
    }
}

/// Command-line overrides applied on top of the file configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub task_file: Option<PathBuf>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_ideas: Option<u32>,
    pub max_runtime_hours: Option<f64>,
    pub max_retries: Option<u32>,
    pub max_consecutive_failures: Option<u32>,
    pub ideas_dir: Option<PathBuf>,
}

impl ThinkTankConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        let backend = &self.backend;
        if backend.base_url.trim().is_empty() {
            return invalid("backend.base_url must not be empty");
        }
        if backend.request_timeout_secs == 0 {
            return invalid("backend.request_timeout_secs must be > 0");
        }
        for (name, value) in [
            ("backend.generator_temperature", backend.generator_temperature),
            ("backend.reviewer_temperature", backend.reviewer_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within 0.0..=2.0 (got {value})"
                )));
            }
        }
        let limits = &self.limits;
        if limits.max_ideas == 0 {
            return invalid("limits.max_ideas must be > 0");
        }
        if !limits.max_runtime_hours.is_finite() || limits.max_runtime_hours <= 0.0 {
            return invalid("limits.max_runtime_hours must be a positive number");
        }
        if limits.max_retries == 0 {
            return invalid("limits.max_retries must be > 0");
        }
        if limits.max_consecutive_failures == 0 {
            return invalid("limits.max_consecutive_failures must be > 0");
        }
        if limits.retry_sleep_seconds > MAX_RETRY_SLEEP_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "limits.retry_sleep_seconds must be <= {MAX_RETRY_SLEEP_SECONDS} (got {})",
                limits.retry_sleep_seconds
            )));
        }
        let paths = &self.paths;
        for (name, path) in [
            ("paths.task_file", &paths.task_file),
            ("paths.ideas_dir", &paths.ideas_dir),
            ("paths.index_file", &paths.index_file),
            ("paths.state_file", &paths.state_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Apply CLI overrides and re-validate the merged result.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(task_file) = &overrides.task_file {
            self.paths.task_file = task_file.clone();
        }
        if let Some(model) = &overrides.model {
            self.backend.model = model.clone();
        }
        if let Some(base_url) = &overrides.base_url {
            self.backend.base_url = base_url.clone();
        }
        if let Some(max_ideas) = overrides.max_ideas {
            self.limits.max_ideas = max_ideas;
        }
        if let Some(hours) = overrides.max_runtime_hours {
            self.limits.max_runtime_hours = hours;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.limits.max_retries = max_retries;
        }
        if let Some(max_failures) = overrides.max_consecutive_failures {
            self.limits.max_consecutive_failures = max_failures;
        }
        if let Some(ideas_dir) = &overrides.ideas_dir {
            self.paths.ideas_dir = ideas_dir.clone();
        }
        self.validate()?;
        Ok(self)
    }

    /// Resolve relative paths against `root`.
    pub fn resolve_paths(mut self, root: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };
        resolve(&mut self.paths.task_file);
        resolve(&mut self.paths.ideas_dir);
        resolve(&mut self.paths.index_file);
        resolve(&mut self.paths.state_file);
        self
    }

    pub fn limits(&self) -> LoopLimits {
        LoopLimits {
            max_ideas: self.limits.max_ideas,
            max_runtime_hours: self.limits.max_runtime_hours,
            max_retries: self.limits.max_retries,
            max_consecutive_failures: self.limits.max_consecutive_failures,
            retry_sleep: Duration::from_secs(self.limits.retry_sleep_seconds),
        }
    }

    pub fn generator_role(&self) -> RoleConfig {
        RoleConfig {
            system_prompt: GENERATOR_SYSTEM.to_string(),
            temperature: self.backend.generator_temperature,
        }
    }

    pub fn reviewer_role(&self) -> RoleConfig {
        RoleConfig {
            system_prompt: REVIEWER_SYSTEM.to_string(),
            temperature: self.backend.reviewer_temperature,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ThinkTankConfig::default()`.
pub fn load_config(path: &Path) -> Result<ThinkTankConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = ThinkTankConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: ThinkTankConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.validate()?;
    debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ThinkTankConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ThinkTankConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("think-tank.toml");
        let mut cfg = ThinkTankConfig::default();
        cfg.backend.model = "qwen2.5-7b".to_string();
        cfg.limits.max_ideas = 7;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("think-tank.toml");
        fs::write(&path, "[limits]\nmax_ideas = 4\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.limits.max_ideas, 4);
        assert_eq!(cfg.limits.max_retries, 3);
        assert_eq!(cfg.backend, BackendConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("think-tank.toml");
        fs::write(&path, "[limits]\nmax_retries = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("max_retries")));
    }

    #[test]
    fn oversized_retry_sleep_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("think-tank.toml");
        fs::write(
            &path,
            "[limits]\nmax_retries = 1\nretry_sleep_seconds = 9223372036854775807\n",
        )
        .expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid(ref msg) if msg.contains("retry_sleep_seconds"))
        );

        fs::write(&path, "[limits]\nretry_sleep_seconds = 86400\n").expect("write");
        let cfg = load_config(&path).expect("one day is allowed");
        assert_eq!(cfg.limits().retry_sleep, Duration::from_secs(86_400));
    }

    #[test]
    fn roles_carry_their_own_temperature() {
        let mut cfg = ThinkTankConfig::default();
        cfg.backend.generator_temperature = 1.1;
        cfg.backend.reviewer_temperature = 0.05;

        let generator = cfg.generator_role();
        let reviewer = cfg.reviewer_role();
        assert_eq!(generator.temperature, 1.1);
        assert_eq!(reviewer.temperature, 0.05);
        assert_eq!(generator.system_prompt, GENERATOR_SYSTEM);
        assert_eq!(reviewer.system_prompt, REVIEWER_SYSTEM);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("think-tank.toml");
        fs::write(&path, "[limits\nmax_ideas = ").expect("write");
        assert!(matches!(
            load_config(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn overrides_apply_and_revalidate() {
        let overrides = ConfigOverrides {
            max_ideas: Some(2),
            model: Some("m".to_string()),
            ..ConfigOverrides::default()
        };
        let cfg = ThinkTankConfig::default()
            .with_overrides(&overrides)
            .expect("merge");
        assert_eq!(cfg.limits.max_ideas, 2);
        assert_eq!(cfg.backend.model, "m");

        let bad = ConfigOverrides {
            max_runtime_hours: Some(-1.0),
            ..ConfigOverrides::default()
        };
        assert!(ThinkTankConfig::default().with_overrides(&bad).is_err());
    }

    #[test]
    fn resolve_paths_keeps_absolute_paths() {
        let root = Path::new("/work");
        let mut cfg = ThinkTankConfig::default();
        cfg.paths.state_file = PathBuf::from("/var/state.json");
        let cfg = cfg.resolve_paths(root);
        assert_eq!(cfg.paths.task_file, PathBuf::from("/work/task.md"));
        assert_eq!(cfg.paths.state_file, PathBuf::from("/var/state.json"));
    }
}
