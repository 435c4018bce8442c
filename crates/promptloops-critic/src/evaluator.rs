use async_trait::async_trait;
use promptloops_backend::{Backend, BackendConfig, BackendError};
use tracing::{debug, info};

use crate::{CriticPrompts, ScoreScale, Verdict, VerdictParseError};

/// Everything the critic sees for one round
#[derive(Debug, Clone, Default)]
pub struct CritiqueRequest {
    /// 1-based round number
    pub round: usize,
    /// Candidate content to judge
    pub content: String,
    /// Running chain of thought, when the candidate carries one
    pub reasoning: Option<String>,
    /// Earlier critiques and scores serialized as JSON
    pub history: Option<String>,
}

/// A capability that judges a candidate and returns a [`Verdict`]
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(&self, request: &CritiqueRequest) -> Result<Verdict, CritiqueError>;
}

/// Critic that asks an LLM backend for a verdict block
pub struct BackendCritic<'a> {
    backend: &'a dyn Backend,
    config: BackendConfig,
    scale: ScoreScale,
}

impl<'a> BackendCritic<'a> {
    pub fn new(backend: &'a dyn Backend, config: BackendConfig) -> Self {
        Self {
            backend,
            config,
            scale: ScoreScale::default(),
        }
    }

    /// Scale the model is asked to score on; verdicts are always
    /// normalized back to 0-100.
    pub fn with_scale(mut self, scale: ScoreScale) -> Self {
        self.scale = scale;
        self
    }

    /// Review a standalone prompt outside of any refinement loop
    pub async fn review_prompt(&self, prompt: &str) -> Result<Verdict, CritiqueError> {
        let rendered = CriticPrompts::build_prompt_review(prompt, self.scale);
        self.ask(&rendered).await
    }

    async fn ask(&self, rendered: &str) -> Result<Verdict, CritiqueError> {
        debug!(
            prompt_len = rendered.len(),
            backend = self.backend.name(),
            "Running critic evaluation"
        );

        let completion = self.backend.complete(rendered, &self.config).await?;

        info!(
            exit_code = completion.exit_code,
            duration_secs = completion.duration.as_secs_f64(),
            "Critic completed"
        );

        if !completion.success() {
            return Err(CritiqueError::NonZeroExit {
                exit_code: completion.exit_code,
                stderr: completion.stderr,
            });
        }

        let verdict = Verdict::parse(&completion.text)?;
        Ok(verdict.normalized(self.scale))
    }
}

#[async_trait]
impl Critic for BackendCritic<'_> {
    async fn critique(&self, request: &CritiqueRequest) -> Result<Verdict, CritiqueError> {
        let rendered = match request.reasoning {
            Some(ref reasoning) => CriticPrompts::build_reasoning_prompt(
                &request.content,
                reasoning,
                request.history.as_deref(),
                request.round,
                self.scale,
            ),
            None => CriticPrompts::build_content_prompt(&request.content, request.round, self.scale),
        };
        self.ask(&rendered).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error("Critic backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Critic exited with code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("Failed to parse critic verdict: {0}")]
    Parse(#[from] VerdictParseError),
}
