//! Project configuration file support for promptloops.
//!
//! Loads configuration from `promptloops.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use promptloops_backend::BackendType;
use promptloops_core::{LoopOptions, RefinementMode};
use promptloops_critic::ScoreScale;

/// Project-level configuration loaded from `promptloops.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default backend (applies to both generator and critic)
    pub backend: Option<String>,
    /// Global default model (applies to both generator and critic)
    pub model: Option<String>,
    /// Loop settings
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSettings,
    /// Generator-specific configuration
    #[serde(default)]
    pub generator: RoleConfig,
    /// Critic-specific configuration
    #[serde(default)]
    pub critic: RoleConfig,
}

/// The `[loop]` table
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoopSettings {
    pub min_score: Option<f64>,
    pub max_attempts: Option<usize>,
    pub stagnation_threshold: Option<usize>,
    pub mode: Option<String>,
    pub require_user_feedback: Option<bool>,
    pub require_user_confirmation: Option<bool>,
}

/// Configuration for a specific role (generator or critic)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Backend to use for this role
    pub backend: Option<String>,
    /// Model to use for this role
    pub model: Option<String>,
    /// Command line for the `command` backend
    pub command: Option<String>,
    /// Per-call timeout; no limit when unset
    pub timeout_secs: Option<u64>,
    /// Scale the critic is asked to score on (critic only)
    pub score_scale: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "promptloops.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Generator,
    Critic,
}

/// Values given on the command line for one role; `None` defers to the file
#[derive(Debug, Default)]
pub struct RoleOverrides {
    pub backend: Option<BackendType>,
    pub model: Option<String>,
    pub command: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Backend settings after merging CLI flags, the role table, and globals
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRole {
    pub backend: BackendType,
    pub model: Option<String>,
    pub command: Option<String>,
    pub timeout: Option<Duration>,
}

/// Loop values given on the command line
#[derive(Debug, Default)]
pub struct LoopOverrides {
    pub min_score: Option<f64>,
    pub max_attempts: Option<usize>,
    pub stagnation_threshold: Option<usize>,
    pub mode: Option<RefinementMode>,
    pub require_user_feedback: Option<bool>,
    pub require_user_confirmation: Option<bool>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Generator => &self.generator,
            Role::Critic => &self.critic,
        }
    }

    /// Effective backend name for a role.
    /// Priority: [role].backend > global backend > None
    pub fn role_backend(&self, role: Role) -> Option<&str> {
        self.role(role).backend.as_deref().or(self.backend.as_deref())
    }

    /// Effective model for a role.
    /// Priority: [role].model > global model > None
    pub fn role_model(&self, role: Role) -> Option<&str> {
        self.role(role).model.as_deref().or(self.model.as_deref())
    }

    /// Merge CLI overrides for a role. Claude Code is the fallback backend.
    pub fn resolve_role(&self, role: Role, cli: RoleOverrides) -> Result<ResolvedRole> {
        let backend = match cli.backend {
            Some(backend) => backend,
            None => match self.role_backend(role) {
                Some(name) => name
                    .parse::<BackendType>()
                    .map_err(|e| anyhow::anyhow!("{} in {}", e, CONFIG_FILE_NAME))?,
                None => BackendType::ClaudeCode,
            },
        };

        let table = self.role(role);
        Ok(ResolvedRole {
            backend,
            model: cli.model.or_else(|| self.role_model(role).map(str::to_string)),
            command: cli.command.or_else(|| table.command.clone()),
            timeout: cli
                .timeout_secs
                .or(table.timeout_secs)
                .map(Duration::from_secs),
        })
    }

    /// Critic score scale from the `[critic]` table
    pub fn critic_scale(&self) -> Result<Option<ScoreScale>> {
        self.critic
            .score_scale
            .as_deref()
            .map(|s| s.parse::<ScoreScale>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("{} in {}", e, CONFIG_FILE_NAME))
    }

    /// Merge CLI overrides with the `[loop]` table over built-in defaults
    pub fn resolve_loop(&self, cli: LoopOverrides) -> Result<(LoopOptions, RefinementMode)> {
        let file = &self.loop_settings;
        let defaults = LoopOptions::default();

        let mode = match cli.mode {
            Some(mode) => mode,
            None => match file.mode.as_deref() {
                Some(name) => name
                    .parse::<RefinementMode>()
                    .map_err(|e| anyhow::anyhow!("{} in {}", e, CONFIG_FILE_NAME))?,
                None => RefinementMode::default(),
            },
        };

        let options = LoopOptions {
            require_user_feedback: cli
                .require_user_feedback
                .or(file.require_user_feedback)
                .unwrap_or(defaults.require_user_feedback),
            require_user_confirmation: cli
                .require_user_confirmation
                .or(file.require_user_confirmation)
                .unwrap_or(defaults.require_user_confirmation),
            min_score: cli
                .min_score
                .or(file.min_score)
                .unwrap_or(defaults.min_score),
            max_attempts: cli
                .max_attempts
                .or(file.max_attempts)
                .unwrap_or(defaults.max_attempts),
            stagnation_threshold: cli
                .stagnation_threshold
                .or(file.stagnation_threshold)
                .unwrap_or(defaults.stagnation_threshold),
        };

        Ok((options, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "agent = \"claude\"\n");
        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_role_precedence() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
backend = "opencode"
model = "global-model"

[critic]
backend = "command"
command = "llm -m mini"
timeout_secs = 30
score_scale = "unit"
"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();

        let generator = config
            .resolve_role(Role::Generator, RoleOverrides::default())
            .unwrap();
        assert_eq!(generator.backend, BackendType::OpenCode);
        assert_eq!(generator.model.as_deref(), Some("global-model"));
        assert_eq!(generator.timeout, None);

        let critic = config
            .resolve_role(Role::Critic, RoleOverrides::default())
            .unwrap();
        assert_eq!(critic.backend, BackendType::Command);
        assert_eq!(critic.command.as_deref(), Some("llm -m mini"));
        assert_eq!(critic.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.critic_scale().unwrap(), Some(ScoreScale::Unit));

        let overridden = config
            .resolve_role(
                Role::Critic,
                RoleOverrides {
                    backend: Some(BackendType::ClaudeCode),
                    model: Some("cli-model".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(overridden.backend, BackendType::ClaudeCode);
        assert_eq!(overridden.model.as_deref(), Some("cli-model"));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = ProjectConfig::default();
        let role = config
            .resolve_role(Role::Generator, RoleOverrides::default())
            .unwrap();
        assert_eq!(role.backend, BackendType::ClaudeCode);
        assert_eq!(role.model, None);

        let (options, mode) = config.resolve_loop(LoopOverrides::default()).unwrap();
        assert_eq!(options, LoopOptions::default());
        assert_eq!(mode, RefinementMode::Content);
    }

    #[test]
    fn test_loop_table_and_overrides() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[loop]
min_score = 90
max_attempts = 4
mode = "reasoning"
require_user_confirmation = true
"#,
        );
        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();

        let (options, mode) = config
            .resolve_loop(LoopOverrides {
                max_attempts: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(mode, RefinementMode::Reasoning);
        assert_eq!(options.min_score, 90.0);
        assert_eq!(options.max_attempts, 2);
        assert_eq!(options.stagnation_threshold, 3);
        assert!(options.require_user_confirmation);
        assert!(!options.require_user_feedback);
    }

    #[test]
    fn test_bad_backend_name_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[generator]\nbackend = \"gpt\"\n");
        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert!(config
            .resolve_role(Role::Generator, RoleOverrides::default())
            .is_err());
    }
}
