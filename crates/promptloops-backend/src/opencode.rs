use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Backend, BackendConfig, BackendError, BackendType, Completion, ProcessSpawner};

/// OpenCode CLI; `run` takes the prompt as its trailing argument
pub struct OpenCodeBackend {
    binary_path: PathBuf,
}

impl OpenCodeBackend {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
        }
    }

    fn args<'a>(prompt: &'a str, model: Option<&'a str>) -> Vec<&'a str> {
        let mut args = vec!["run"];
        if let Some(model) = model {
            args.extend(["--model", model]);
        }
        // `--` keeps prompts that start with '-' from being read as flags
        args.extend(["--", prompt]);
        args
    }
}

impl Default for OpenCodeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for OpenCodeBackend {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::OpenCode
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

        let args = Self::args(prompt, config.model.as_deref());
        ProcessSpawner::spawn(&self.binary_path, &args, None, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_follows_separator() {
        assert_eq!(
            OpenCodeBackend::args("-x fix this", Some("gpt")),
            vec!["run", "--model", "gpt", "--", "-x fix this"]
        );
    }
}
