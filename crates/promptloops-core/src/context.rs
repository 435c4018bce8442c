use promptloops_critic::Verdict;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::{LoopError, TerminationState};

/// Knobs that bound and shape one refinement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOptions {
    /// Ask the user to answer the critic's clarifying questions
    pub require_user_feedback: bool,
    /// Pause after generation and after critique so the user can stop
    pub require_user_confirmation: bool,
    /// Score (0-100) at which the run stops successfully
    pub min_score: f64,
    /// Hard upper bound on rounds
    pub max_attempts: usize,
    /// Consecutive non-improving rounds that end the run
    pub stagnation_threshold: usize,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            require_user_feedback: false,
            require_user_confirmation: false,
            min_score: 85.0,
            max_attempts: 6,
            stagnation_threshold: 3,
        }
    }
}

impl LoopOptions {
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_stagnation_threshold(mut self, threshold: usize) -> Self {
        self.stagnation_threshold = threshold;
        self
    }

    pub fn with_user_feedback(mut self, enabled: bool) -> Self {
        self.require_user_feedback = enabled;
        self
    }

    pub fn with_user_confirmation(mut self, enabled: bool) -> Self {
        self.require_user_confirmation = enabled;
        self
    }

    /// Whether the loop will need an interaction port
    pub fn is_interactive(&self) -> bool {
        self.require_user_feedback || self.require_user_confirmation
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.max_attempts == 0 {
            return Err(LoopError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.stagnation_threshold == 0 {
            return Err(LoopError::ConfigError(
                "stagnation_threshold must be at least 1".to_string(),
            ));
        }
        if !self.min_score.is_finite() {
            return Err(LoopError::ConfigError(format!(
                "min_score must be a finite number, got {}",
                self.min_score
            )));
        }
        Ok(())
    }
}

/// The most recent work product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub content: String,
    /// Accumulated chain of thought (reasoning mode only)
    pub reasoning: Option<String>,
}

/// Append-only record of every verdict and its score
#[derive(Debug, Clone, Default)]
pub struct History {
    verdicts: Vec<Verdict>,
    scores: Vec<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry<'a> {
    round: usize,
    score: f64,
    critique: &'a str,
    clarifying_questions: &'a [String],
}

impl History {
    pub fn push(&mut self, verdict: Verdict) {
        self.scores.push(verdict.effective_score());
        self.verdicts.push(verdict);
    }

    pub fn latest(&self) -> Option<&Verdict> {
        self.verdicts.last()
    }

    pub fn latest_score(&self) -> Option<f64> {
        self.scores.last().copied()
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Serialize critiques and scores so a critic can see earlier rounds
    pub fn to_context_json(&self) -> String {
        let entries: Vec<HistoryEntry<'_>> = self
            .verdicts
            .iter()
            .zip(&self.scores)
            .enumerate()
            .map(|(i, (verdict, score))| HistoryEntry {
                round: i + 1,
                score: *score,
                critique: &verdict.critique,
                clarifying_questions: &verdict.clarifying_questions,
            })
            .collect();
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }

    pub(crate) fn into_parts(self) -> (Vec<Verdict>, Vec<f64>) {
        (self.verdicts, self.scores)
    }
}

/// State the loop owns for the lifetime of one run
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// Original prompt supplied by the caller
    pub prompt: String,
    pub options: LoopOptions,
    /// None until the first generation completes
    pub candidate: Option<Candidate>,
    pub history: History,
    pub termination: TerminationState,
    /// User answers, or forwarded clarifying questions, one per round
    pub feedback_log: Vec<String>,
    /// Feedback input for the next generation
    pub pending_feedback: String,
    started_at: Instant,
}

impl LoopContext {
    pub fn new(prompt: String, options: LoopOptions) -> Self {
        Self {
            prompt,
            options,
            candidate: None,
            history: History::default(),
            termination: TerminationState::default(),
            feedback_log: Vec::new(),
            pending_feedback: String::new(),
            started_at: Instant::now(),
        }
    }

    /// Current 1-based round (0 before the first round starts)
    pub fn round(&self) -> usize {
        self.termination.attempts
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(LoopOptions::default().validate().is_ok());
        assert!(!LoopOptions::default().is_interactive());
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let zero_attempts = LoopOptions::default().with_max_attempts(0);
        assert!(matches!(
            zero_attempts.validate(),
            Err(LoopError::ConfigError(_))
        ));

        let zero_threshold = LoopOptions::default().with_stagnation_threshold(0);
        assert!(zero_threshold.validate().is_err());

        let nan_score = LoopOptions::default().with_min_score(f64::NAN);
        assert!(nan_score.validate().is_err());
    }

    #[test]
    fn test_history_defaults_missing_score() {
        let mut history = History::default();
        history.push(Verdict {
            score: Some(40.0),
            ..Default::default()
        });
        history.push(Verdict::default());

        assert_eq!(history.len(), 2);
        assert_eq!(history.scores(), &[40.0, 0.0]);
        assert_eq!(history.latest_score(), Some(0.0));
    }

    #[test]
    fn test_history_context_json() {
        let mut history = History::default();
        history.push(Verdict {
            critique: "too long".to_string(),
            score: Some(30.0),
            clarifying_questions: vec!["Audience?".to_string()],
            follow_up_suggestions: vec![],
        });

        let json: serde_json::Value = serde_json::from_str(&history.to_context_json()).unwrap();
        assert_eq!(json[0]["round"], 1);
        assert_eq!(json[0]["score"], 30.0);
        assert_eq!(json[0]["critique"], "too long");
        assert_eq!(json[0]["clarifyingQuestions"][0], "Audience?");
    }
}
