use serde::{Deserialize, Serialize};

use crate::LoopOptions;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    #[serde(rename = "desired score reached")]
    DesiredScoreReached,
    #[serde(rename = "no significant improvement detected")]
    NoImprovement,
    #[serde(rename = "maximum attempts reached")]
    MaxAttemptsReached,
    #[serde(rename = "user terminated the process")]
    UserTerminated,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::DesiredScoreReached => "desired score reached",
            StopReason::NoImprovement => "no significant improvement detected",
            StopReason::MaxAttemptsReached => "maximum attempts reached",
            StopReason::UserTerminated => "user terminated the process",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StopReason::DesiredScoreReached)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            StopReason::DesiredScoreReached => 0,
            StopReason::MaxAttemptsReached => 1,
            StopReason::NoImprovement => 3,
            StopReason::UserTerminated => 130,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters that decide when the loop stops
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminationState {
    /// Rounds started so far; never exceeds `max_attempts`
    pub attempts: usize,
    /// Score of the previous round (0 before the first)
    pub previous_score: f64,
    /// Consecutive rounds whose score did not beat the previous one
    pub stagnation_counter: usize,
    pub reason: Option<StopReason>,
}

impl TerminationState {
    /// Start a new round. Returns false, and records exhaustion, when the
    /// attempt budget is already spent.
    pub fn begin_round(&mut self, max_attempts: usize) -> bool {
        if self.attempts >= max_attempts {
            self.stop(StopReason::MaxAttemptsReached);
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Update the stagnation counter. A tie counts as no improvement.
    pub fn record_score(&mut self, score: f64) {
        if score <= self.previous_score {
            self.stagnation_counter += 1;
        } else {
            self.stagnation_counter = 0;
        }
        self.previous_score = score;
    }

    /// Check the success threshold, then the stagnation limit
    pub fn evaluate(&self, score: f64, options: &LoopOptions) -> Option<StopReason> {
        if score >= options.min_score {
            Some(StopReason::DesiredScoreReached)
        } else if self.stagnation_counter >= options.stagnation_threshold {
            Some(StopReason::NoImprovement)
        } else {
            None
        }
    }

    pub fn stop(&mut self, reason: StopReason) {
        if self.reason.is_none() {
            self.reason = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_round_respects_budget() {
        let mut state = TerminationState::default();
        assert!(state.begin_round(2));
        assert!(state.begin_round(2));
        assert!(!state.begin_round(2));
        assert_eq!(state.attempts, 2);
        assert_eq!(state.reason, Some(StopReason::MaxAttemptsReached));
    }

    #[test]
    fn test_tie_counts_as_stagnation() {
        let mut state = TerminationState::default();
        state.record_score(10.0);
        assert_eq!(state.stagnation_counter, 0);
        state.record_score(10.0);
        assert_eq!(state.stagnation_counter, 1);
        state.record_score(5.0);
        assert_eq!(state.stagnation_counter, 2);
        state.record_score(6.0);
        assert_eq!(state.stagnation_counter, 0);
        assert_eq!(state.previous_score, 6.0);
    }

    #[test]
    fn test_zero_first_score_is_stagnation() {
        let mut state = TerminationState::default();
        state.record_score(0.0);
        assert_eq!(state.stagnation_counter, 1);
    }

    #[test]
    fn test_threshold_wins_over_stagnation() {
        let options = LoopOptions::default()
            .with_min_score(50.0)
            .with_stagnation_threshold(1);
        let state = TerminationState {
            stagnation_counter: 1,
            ..Default::default()
        };
        assert_eq!(
            state.evaluate(50.0, &options),
            Some(StopReason::DesiredScoreReached)
        );
        assert_eq!(state.evaluate(49.9, &options), Some(StopReason::NoImprovement));
    }

    #[test]
    fn test_first_reason_is_kept() {
        let mut state = TerminationState::default();
        state.stop(StopReason::UserTerminated);
        state.stop(StopReason::MaxAttemptsReached);
        assert_eq!(state.reason, Some(StopReason::UserTerminated));
    }

    #[test]
    fn test_reason_serializes_as_message() {
        let json = serde_json::to_string(&StopReason::NoImprovement).unwrap();
        assert_eq!(json, "\"no significant improvement detected\"");
        assert_eq!(StopReason::UserTerminated.exit_code(), 130);
    }
}
