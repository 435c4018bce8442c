use promptloops_critic::Verdict;
use serde::{Deserialize, Serialize};

use crate::{LoopContext, StopReason};

/// The final result of a refinement run. Built once when the loop exits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBundle {
    pub reason_to_stop: StopReason,
    /// Score of the last completed round (0 when no round was critiqued)
    pub final_score: f64,
    pub final_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_reasoning: Option<String>,
    pub critique_history: Vec<Verdict>,
    pub score_history: Vec<f64>,
    /// None when nothing was collected
    pub user_feedback_incorporated: Option<Vec<String>>,
    pub rounds: usize,
    pub total_duration_secs: f64,
}

impl ResultBundle {
    pub(crate) fn assemble(context: LoopContext, reason: StopReason) -> Self {
        let total_duration_secs = context.total_duration().as_secs_f64();
        let final_score = context.history.latest_score().unwrap_or(0.0);
        let rounds = context.termination.attempts;
        let (critique_history, score_history) = context.history.into_parts();
        let candidate = context.candidate.unwrap_or_default();

        let user_feedback_incorporated = if context.feedback_log.is_empty() {
            None
        } else {
            Some(context.feedback_log)
        };

        Self {
            reason_to_stop: reason,
            final_score,
            final_content: candidate.content,
            final_reasoning: candidate.reasoning,
            critique_history,
            score_history,
            user_feedback_incorporated,
            rounds,
            total_duration_secs,
        }
    }

    pub fn is_success(&self) -> bool {
        self.reason_to_stop.is_success()
    }

    pub fn exit_code(&self) -> i32 {
        self.reason_to_stop.exit_code()
    }
}
