use promptloops_critic::CritiqueRequest;
use serde::{Deserialize, Serialize};

use crate::{Candidate, Generation, GenerationRequest, LoopContext};

/// Which kind of work product the loop refines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefinementMode {
    /// Rewrite the latest content each round
    #[default]
    Content,
    /// Re-solve the original prompt while extending a chain of thought
    Reasoning,
}

impl RefinementMode {
    pub fn composer(self) -> Box<dyn FeedbackComposer> {
        match self {
            RefinementMode::Content => Box::new(ContentComposer),
            RefinementMode::Reasoning => Box::new(ReasoningComposer),
        }
    }
}

impl std::fmt::Display for RefinementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefinementMode::Content => write!(f, "content"),
            RefinementMode::Reasoning => write!(f, "reasoning"),
        }
    }
}

impl std::str::FromStr for RefinementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" | "plain" => Ok(RefinementMode::Content),
            "reasoning" | "cot" | "chain-of-thought" => Ok(RefinementMode::Reasoning),
            _ => Err(format!("Unknown refinement mode: {}", s)),
        }
    }
}

/// Decides what context flows to the generator and the critic each round
pub trait FeedbackComposer: Send + Sync {
    fn mode(&self) -> RefinementMode;

    /// Build the generator request for the round that is starting
    fn generation_request(&self, context: &LoopContext) -> GenerationRequest;

    /// Fold a new generation into the candidate carried between rounds
    fn absorb(&self, previous: Option<Candidate>, generation: Generation) -> Candidate;

    /// Build the critic request for the candidate just produced
    fn critique_request(&self, context: &LoopContext, candidate: &Candidate) -> CritiqueRequest;
}

/// Latest critique and suggestions; empty before the first verdict
fn latest_feedback(context: &LoopContext) -> (String, String) {
    context
        .history
        .latest()
        .map(|v| (v.critique.clone(), v.joined_suggestions()))
        .unwrap_or_default()
}

/// Plain content: the generator rewrites its own last draft and sees only
/// the most recent feedback.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentComposer;

impl FeedbackComposer for ContentComposer {
    fn mode(&self) -> RefinementMode {
        RefinementMode::Content
    }

    fn generation_request(&self, context: &LoopContext) -> GenerationRequest {
        let (critique, follow_up_suggestions) = latest_feedback(context);
        let subject = match context.candidate {
            Some(ref candidate) => candidate.content.clone(),
            None => context.prompt.clone(),
        };
        GenerationRequest {
            round: context.round(),
            subject,
            critique,
            follow_up_suggestions,
            feedback: context.pending_feedback.clone(),
            reasoning: None,
        }
    }

    fn absorb(&self, _previous: Option<Candidate>, generation: Generation) -> Candidate {
        Candidate {
            content: generation.content,
            reasoning: None,
        }
    }

    fn critique_request(&self, context: &LoopContext, candidate: &Candidate) -> CritiqueRequest {
        CritiqueRequest {
            round: context.round(),
            content: candidate.content.clone(),
            reasoning: None,
            history: None,
        }
    }
}

/// Chain of thought: the generator always works from the original prompt,
/// is re-supplied the whole trace, and sees every piece of feedback so far.
/// The critic also receives the serialized history.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningComposer;

impl FeedbackComposer for ReasoningComposer {
    fn mode(&self) -> RefinementMode {
        RefinementMode::Reasoning
    }

    fn generation_request(&self, context: &LoopContext) -> GenerationRequest {
        let (critique, follow_up_suggestions) = latest_feedback(context);
        let reasoning = context
            .candidate
            .as_ref()
            .and_then(|c| c.reasoning.clone())
            .unwrap_or_default();
        GenerationRequest {
            round: context.round(),
            subject: context.prompt.clone(),
            critique,
            follow_up_suggestions,
            feedback: context.feedback_log.join("\n"),
            reasoning: Some(reasoning),
        }
    }

    fn absorb(&self, previous: Option<Candidate>, generation: Generation) -> Candidate {
        let mut trace = previous.and_then(|c| c.reasoning).unwrap_or_default();
        if let Some(step) = generation.reasoning.filter(|s| !s.trim().is_empty()) {
            if !trace.is_empty() {
                trace.push_str("\n\n");
            }
            trace.push_str(&step);
        }
        Candidate {
            content: generation.content,
            reasoning: Some(trace),
        }
    }

    fn critique_request(&self, context: &LoopContext, candidate: &Candidate) -> CritiqueRequest {
        let history = if context.history.is_empty() {
            None
        } else {
            Some(context.history.to_context_json())
        };
        CritiqueRequest {
            round: context.round(),
            content: candidate.content.clone(),
            reasoning: Some(candidate.reasoning.clone().unwrap_or_default()),
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoopOptions;
    use promptloops_critic::Verdict;

    fn context_after_one_round() -> LoopContext {
        let mut context = LoopContext::new("Explain tides".to_string(), LoopOptions::default());
        context.termination.attempts = 2;
        context.candidate = Some(Candidate {
            content: "Tides come from the moon.".to_string(),
            reasoning: Some("Gravity pulls water.".to_string()),
        });
        context.history.push(Verdict {
            critique: "Mention the sun".to_string(),
            score: Some(40.0),
            clarifying_questions: vec!["For kids?".to_string()],
            follow_up_suggestions: vec!["Add a diagram".to_string(), "Shorter".to_string()],
        });
        context.feedback_log = vec!["earlier answer".to_string(), "For kids?".to_string()];
        context.pending_feedback = "For kids?".to_string();
        context
    }

    #[test]
    fn test_content_first_round_uses_prompt() {
        let context = LoopContext::new("Write a slogan".to_string(), LoopOptions::default());
        let request = ContentComposer.generation_request(&context);
        assert_eq!(request.subject, "Write a slogan");
        assert!(request.critique.is_empty());
        assert!(request.follow_up_suggestions.is_empty());
        assert!(request.feedback.is_empty());
        assert_eq!(request.reasoning, None);
    }

    #[test]
    fn test_content_uses_candidate_and_latest_feedback() {
        let context = context_after_one_round();
        let request = ContentComposer.generation_request(&context);
        assert_eq!(request.round, 2);
        assert_eq!(request.subject, "Tides come from the moon.");
        assert_eq!(request.critique, "Mention the sun");
        assert_eq!(request.follow_up_suggestions, "Add a diagram\nShorter");
        assert_eq!(request.feedback, "For kids?");
    }

    #[test]
    fn test_reasoning_uses_prompt_trace_and_full_log() {
        let context = context_after_one_round();
        let request = ReasoningComposer.generation_request(&context);
        assert_eq!(request.subject, "Explain tides");
        assert_eq!(request.reasoning.as_deref(), Some("Gravity pulls water."));
        assert_eq!(request.feedback, "earlier answer\nFor kids?");
    }

    #[test]
    fn test_reasoning_trace_accumulates() {
        let previous = Candidate {
            content: "old".to_string(),
            reasoning: Some("step one".to_string()),
        };
        let candidate = ReasoningComposer.absorb(
            Some(previous),
            Generation {
                content: "new".to_string(),
                reasoning: Some("step two".to_string()),
            },
        );
        assert_eq!(candidate.content, "new");
        assert_eq!(candidate.reasoning.as_deref(), Some("step one\n\nstep two"));

        let unchanged = ReasoningComposer.absorb(Some(candidate), Generation::content("newer"));
        assert_eq!(unchanged.reasoning.as_deref(), Some("step one\n\nstep two"));
    }

    #[test]
    fn test_critique_requests() {
        let context = context_after_one_round();
        let candidate = context.candidate.clone().unwrap();

        let plain = ContentComposer.critique_request(&context, &candidate);
        assert_eq!(plain.reasoning, None);
        assert_eq!(plain.history, None);

        let reasoning = ReasoningComposer.critique_request(&context, &candidate);
        assert_eq!(reasoning.reasoning.as_deref(), Some("Gravity pulls water."));
        assert!(reasoning.history.unwrap().contains("Mention the sun"));
    }

    #[test]
    fn test_mode_parse_and_composer() {
        assert_eq!(
            "CoT".parse::<RefinementMode>().unwrap(),
            RefinementMode::Reasoning
        );
        assert_eq!(
            RefinementMode::Reasoning.composer().mode(),
            RefinementMode::Reasoning
        );
        assert!("poem".parse::<RefinementMode>().is_err());
    }
}
