//! # promptloops-backend
//!
//! Backends turn a fully rendered prompt into model text. The loop never
//! talks to a vendor API directly; it shells out to an LLM CLI that is
//! already authenticated on the machine.

mod claude;
mod command;
mod opencode;
mod output;
mod spawner;
mod traits;

pub use claude::ClaudeCodeBackend;
pub use command::CommandBackend;
pub use opencode::OpenCodeBackend;
pub use output::Completion;
pub use spawner::ProcessSpawner;
pub use traits::{Backend, BackendConfig, BackendError, BackendType};

/// Create a backend by type.
///
/// `command` is only consulted for [`BackendType::Command`], where it holds
/// the full command line (program plus arguments) that reads the prompt on
/// stdin.
pub fn create_backend(
    backend_type: BackendType,
    command: Option<&str>,
) -> Result<Box<dyn Backend>, BackendError> {
    match backend_type {
        BackendType::ClaudeCode => Ok(Box::new(ClaudeCodeBackend::new())),
        BackendType::OpenCode => Ok(Box::new(OpenCodeBackend::new())),
        BackendType::Command => {
            let line = command.ok_or_else(|| {
                BackendError::ConfigError(
                    "the command backend requires a command line".to_string(),
                )
            })?;
            Ok(Box::new(CommandBackend::parse(line)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_backend_requires_command_line() {
        let result = create_backend(BackendType::Command, None);
        assert!(matches!(result, Err(BackendError::ConfigError(_))));
    }

    #[test]
    fn test_create_named_backends() {
        let claude = create_backend(BackendType::ClaudeCode, None).unwrap();
        assert_eq!(claude.backend_type(), BackendType::ClaudeCode);

        let opencode = create_backend(BackendType::OpenCode, Some("ignored")).unwrap();
        assert_eq!(opencode.backend_type(), BackendType::OpenCode);
    }
}
