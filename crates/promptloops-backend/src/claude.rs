use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Backend, BackendConfig, BackendError, BackendType, Completion, ProcessSpawner};

/// Claude Code CLI in print mode; the prompt goes over stdin
pub struct ClaudeCodeBackend {
    binary_path: PathBuf,
}

impl ClaudeCodeBackend {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
        }
    }

    fn args(model: Option<&str>) -> Vec<&str> {
        let mut args = vec!["--print", "--output-format", "text"];
        if let Some(model) = model {
            args.extend(["--model", model]);
        }
        args
    }
}

impl Default for ClaudeCodeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for ClaudeCodeBackend {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::ClaudeCode
    }

    fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn is_available(&self) -> bool {
        ProcessSpawner::answers_version(&self.binary_path).await
    }

    async fn complete(
        &self,
        prompt: &str,
        config: &BackendConfig,
    ) -> Result<Completion, BackendError> {
        debug!(backend = self.name(), prompt_len = prompt.len(), "Requesting completion");

        let args = Self::args(config.model.as_deref());
        ProcessSpawner::spawn(&self.binary_path, &args, Some(prompt), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_flag_is_optional() {
        assert_eq!(
            ClaudeCodeBackend::args(None),
            vec!["--print", "--output-format", "text"]
        );
        assert_eq!(
            ClaudeCodeBackend::args(Some("opus")),
            vec!["--print", "--output-format", "text", "--model", "opus"]
        );
    }
}
