use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::Completion;

/// Errors that can occur while asking a backend for a completion
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to spawn backend process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend not found at path: {0}")]
    NotFound(String),

    #[error("Backend configuration error: {0}")]
    ConfigError(String),

    #[error("Backend exited with code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("Backend execution failed: {0}")]
    ExecutionFailed(String),
}

/// Configuration for a single backend call
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Working directory for the backend process
    pub working_dir: PathBuf,
    /// Optional timeout (None = wait indefinitely)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
    /// Model to use (if the backend supports it)
    pub model: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
        }
    }
}

impl BackendConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// Supported backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    ClaudeCode,
    OpenCode,
    /// Any command that reads a prompt on stdin and prints the completion
    Command,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::ClaudeCode => write!(f, "claude"),
            BackendType::OpenCode => write!(f, "opencode"),
            BackendType::Command => write!(f, "command"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(BackendType::ClaudeCode),
            "opencode" | "open-code" => Ok(BackendType::OpenCode),
            "command" | "cmd" => Ok(BackendType::Command),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

/// A text-completion capability backed by some LLM
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    fn backend_type(&self) -> BackendType;

    /// Send a prompt and wait for the full completion
    async fn complete(
        &self,
        prompt: &str,
        config: &BackendConfig,
    ) -> Result<Completion, BackendError>;

    /// Check if the backend binary is available on the system
    async fn is_available(&self) -> bool;

    fn binary_path(&self) -> &Path;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_round_trips_through_display() {
        for ty in [
            BackendType::ClaudeCode,
            BackendType::OpenCode,
            BackendType::Command,
        ] {
            let parsed: BackendType = ty.to_string().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn test_backend_type_aliases() {
        assert_eq!(
            "Claude-Code".parse::<BackendType>().unwrap(),
            BackendType::ClaudeCode
        );
        assert_eq!("cmd".parse::<BackendType>().unwrap(), BackendType::Command);
        assert!("gpt".parse::<BackendType>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = BackendConfig::new(PathBuf::from("/tmp"))
            .with_model("sonnet".to_string())
            .with_timeout(Duration::from_secs(30))
            .with_env("KEY".to_string(), "value".to_string());
        assert_eq!(config.model.as_deref(), Some("sonnet"));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.env_vars.get("KEY").map(String::as_str), Some("value"));
    }
}
