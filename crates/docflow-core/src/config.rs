use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DocflowError, Result};
use crate::types::Priority;

/// Top-level docflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Execution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deepest node (trigger = depth 0) the walker will evaluate.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Register `autoRoute` / `sendNotification`, which only record intent.
    #[serde(default = "default_allow_stub_actions")]
    pub allow_stub_actions: bool,
    /// Priority for approval requests whose node sets none.
    #[serde(default = "default_priority")]
    pub default_priority: Priority,
    /// Due date offset for approval requests whose node sets none.
    #[serde(default)]
    pub default_due_days: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            allow_stub_actions: default_allow_stub_actions(),
            default_priority: default_priority(),
            default_due_days: None,
        }
    }
}

fn default_max_depth() -> usize { 64 }
fn default_allow_stub_actions() -> bool { true }
fn default_priority() -> Priority { Priority::Medium }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String { "~/.docflow/docflow.db".to_string() }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| DocflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| DocflowError::Config(e.to_string()))
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Config file absent, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve the database path (expand ~).
    pub fn store_path(&self) -> PathBuf {
        let path = &self.store.path;
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> &str {
        self.log.filter.as_deref().unwrap_or("docflow=info,warn")
    }
}

/// Expand `${ENV_VAR}` patterns in a string. Unset variables are kept verbatim.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_DOCFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_DOCFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_DOCFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_DOCFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_DOCFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_depth, 64);
        assert!(config.engine.allow_stub_actions);
        assert_eq!(config.engine.default_priority, Priority::Medium);
        assert!(config.engine.default_due_days.is_none());
        assert_eq!(config.store.path, "~/.docflow/docflow.db");
        assert_eq!(config.log_filter(), "docflow=info,warn");
    }

    #[test]
    fn test_partial_engine_section() {
        let toml_str = r#"
[engine]
allow_stub_actions = false
default_priority = "high"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.engine.allow_stub_actions);
        assert_eq!(config.engine.default_priority, Priority::High);
        assert_eq!(config.engine.max_depth, 64);
    }

    #[test]
    fn test_store_path_absolute() {
        let mut config = AppConfig::default();
        config.store.path = "/var/lib/docflow/db.sqlite".into();
        assert_eq!(config.store_path(), PathBuf::from("/var/lib/docflow/db.sqlite"));
    }
}
