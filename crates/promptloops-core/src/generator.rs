use async_trait::async_trait;
use promptloops_backend::{Backend, BackendConfig, BackendError};
use tracing::{debug, info};

use crate::GeneratorPrompts;

/// What the generator is shown for one round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    /// 1-based round number
    pub round: usize,
    /// Text to work on: the current candidate, or the original prompt
    pub subject: String,
    /// Latest critique text
    pub critique: String,
    /// Latest follow-up suggestions, newline-joined
    pub follow_up_suggestions: String,
    /// User answers or forwarded clarifying questions
    pub feedback: String,
    /// Running chain of thought; `Some` only in reasoning mode
    pub reasoning: Option<String>,
}

/// A freshly generated work product
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub content: String,
    /// Reasoning produced this round, if any
    pub reasoning: Option<String>,
}

impl Generation {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning: None,
        }
    }

    /// Split `<reasoning>` / `<answer>` tagged output. Untagged text is
    /// taken as the answer.
    pub fn parse_tagged(output: &str) -> Self {
        let reasoning = tag_body(output, "reasoning").map(str::to_string);
        let content = match tag_body(output, "answer") {
            Some(answer) => answer.to_string(),
            None => match output.rfind("</reasoning>") {
                Some(end) => output[end + "</reasoning>".len()..].trim().to_string(),
                None => output.trim().to_string(),
            },
        };
        Self { content, reasoning }
    }
}

fn tag_body<'a>(output: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = output.find(&open)? + open.len();
    let len = output[start..].find(&close)?;
    Some(output[start..start + len].trim())
}

/// A capability that produces a candidate from a request
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generator backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Generator exited with code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("Generator returned no content")]
    EmptyOutput,
}

/// Generator that renders a prompt and asks an LLM backend
pub struct BackendGenerator<'a> {
    backend: &'a dyn Backend,
    config: BackendConfig,
}

impl<'a> BackendGenerator<'a> {
    pub fn new(backend: &'a dyn Backend, config: BackendConfig) -> Self {
        Self { backend, config }
    }
}

#[async_trait]
impl Generator for BackendGenerator<'_> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        let prompt = match request.reasoning {
            Some(_) => GeneratorPrompts::build_reasoning_prompt(request),
            None => GeneratorPrompts::build_content_prompt(request),
        };

        debug!(
            round = request.round,
            prompt_len = prompt.len(),
            backend = self.backend.name(),
            "Running generator"
        );

        let completion = self.backend.complete(&prompt, &self.config).await?;

        info!(
            exit_code = completion.exit_code,
            output_lines = completion.text_lines(),
            duration_secs = completion.duration.as_secs_f64(),
            "Generator completed"
        );

        if !completion.success() {
            return Err(GenerationError::NonZeroExit {
                exit_code: completion.exit_code,
                stderr: completion.stderr,
            });
        }

        let generation = match request.reasoning {
            Some(_) => Generation::parse_tagged(&completion.text),
            None => Generation::content(completion.trimmed()),
        };

        if generation.content.is_empty() && generation.reasoning.is_none() {
            return Err(GenerationError::EmptyOutput);
        }
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_output() {
        let output = "<reasoning>\n1. a\n2. b\n</reasoning>\n<answer>\n42\n</answer>";
        let generation = Generation::parse_tagged(output);
        assert_eq!(generation.reasoning.as_deref(), Some("1. a\n2. b"));
        assert_eq!(generation.content, "42");
    }

    #[test]
    fn test_parse_without_answer_tag() {
        let generation = Generation::parse_tagged("<reasoning>think</reasoning>\nThe answer is 7.");
        assert_eq!(generation.reasoning.as_deref(), Some("think"));
        assert_eq!(generation.content, "The answer is 7.");
    }

    #[test]
    fn test_parse_untagged_output() {
        let generation = Generation::parse_tagged("  plain text  ");
        assert_eq!(generation.reasoning, None);
        assert_eq!(generation.content, "plain text");
    }
}
