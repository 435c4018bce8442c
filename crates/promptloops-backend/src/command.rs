use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Backend, BackendConfig, BackendError, BackendType, Completion, ProcessSpawner};

/// Arbitrary command that reads a prompt on stdin and prints the completion.
///
/// A configured model is exported to the child as `PROMPTLOOPS_MODEL`
/// rather than spliced into the arguments.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    binary_path: PathBuf,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(binary_path: PathBuf, args: Vec<String>) -> Self {
        Self { binary_path, args }
    }

    /// Parse a shell-style command line such as `llm -m gpt-4o-mini`
    pub fn parse(command_line: &str) -> Result<Self, BackendError> {
        let mut words = shell_words::split(command_line).map_err(|e| {
            BackendError::ConfigError(format!("invalid command line '{}': {}", command_line, e))
        })?;
        if words.is_empty() {
            return Err(BackendError::ConfigError(
                "command line is empty".to_string(),
            ));
        }
        let program = words.remove(0);
        Ok(Self::new(PathBuf::from(program), words))
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Backend for CommandBackend {
    fn name(&self) -> &str {
        "Command"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Command
    }

    fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn is_available(&self) -> bool {
        // Arbitrary commands have no common version flag, and launching one
        // would send it an empty request; only look it up.
        ProcessSpawner::locate(&self.binary_path).is_some()
    }

    async fn complete(
        &self,
        prompt: &str,
        config: &BackendConfig,
    ) -> Result<Completion, BackendError> {
        debug!(
            backend = %self.binary_path.display(),
            prompt_len = prompt.len(),
            "Requesting completion"
        );

        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();

        let mut config = config.clone();
        if let Some(model) = config.model.clone() {
            config.env_vars.insert("PROMPTLOOPS_MODEL".to_string(), model);
        }

        ProcessSpawner::spawn(&self.binary_path, &args, Some(prompt), &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_quoted_arguments() {
        let backend = CommandBackend::parse(r#"llm -m gpt-4o-mini --system "be terse""#).unwrap();
        assert_eq!(backend.binary_path(), Path::new("llm"));
        assert_eq!(backend.args(), &["-m", "gpt-4o-mini", "--system", "be terse"]);
    }

    #[test]
    fn test_parse_rejects_empty_and_unbalanced() {
        assert!(matches!(
            CommandBackend::parse("   "),
            Err(BackendError::ConfigError(_))
        ));
        assert!(matches!(
            CommandBackend::parse("llm \"unterminated"),
            Err(BackendError::ConfigError(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_availability_is_a_path_lookup() {
        assert!(CommandBackend::parse("sh -c true").unwrap().is_available().await);
        assert!(CommandBackend::parse("/bin/sh").unwrap().is_available().await);
        assert!(!CommandBackend::parse("promptloops-no-such-llm")
            .unwrap()
            .is_available()
            .await);
        assert!(!CommandBackend::parse("/nonexistent/dir/llm")
            .unwrap()
            .is_available()
            .await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_complete_exports_model() {
        let backend = CommandBackend::parse("sh -c 'cat; printf \" [%s]\" \"$PROMPTLOOPS_MODEL\"'").unwrap();
        let config = BackendConfig::default().with_model("mini".to_string());
        let completion = backend.complete("draft", &config).await.unwrap();
        assert_eq!(completion.trimmed(), "draft [mini]");
    }
}
