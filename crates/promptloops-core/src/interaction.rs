use async_trait::async_trait;
use promptloops_critic::Verdict;
use thiserror::Error;

use crate::Candidate;

/// Reply typed by a user to stop the loop at a checkpoint
pub const STOP_SENTINEL: &str = "stop";

/// Where the loop paused for the user
#[derive(Debug, Clone, Copy)]
pub enum Checkpoint<'a> {
    Generated {
        round: usize,
        candidate: &'a Candidate,
    },
    Critiqued {
        round: usize,
        verdict: &'a Verdict,
    },
}

impl Checkpoint<'_> {
    pub fn round(&self) -> usize {
        match self {
            Checkpoint::Generated { round, .. } | Checkpoint::Critiqued { round, .. } => *round,
        }
    }

    /// Short label used in log events
    pub fn stage(&self) -> &'static str {
        match self {
            Checkpoint::Generated { .. } => "generation",
            Checkpoint::Critiqued { .. } => "critique",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Continue,
    Stop,
}

impl Confirmation {
    /// Interpret a free-text reply; only the stop sentinel stops
    pub fn from_reply(reply: &str) -> Self {
        if reply.trim().eq_ignore_ascii_case(STOP_SENTINEL) {
            Confirmation::Stop
        } else {
            Confirmation::Continue
        }
    }
}

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Failed to read user input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interaction channel closed: {0}")]
    Closed(String),
}

/// Port through which the loop talks to a human
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Show the checkpoint and let the user continue or stop
    async fn confirm(&self, checkpoint: Checkpoint<'_>) -> Result<Confirmation, InteractionError>;

    /// Ask the critic's clarifying questions; returns the user's answer
    async fn ask(&self, round: usize, questions: &[String]) -> Result<String, InteractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_sentinel_is_case_insensitive() {
        assert_eq!(Confirmation::from_reply("STOP\n"), Confirmation::Stop);
        assert_eq!(Confirmation::from_reply(" stop "), Confirmation::Stop);
        assert_eq!(Confirmation::from_reply(""), Confirmation::Continue);
        assert_eq!(Confirmation::from_reply("stop now"), Confirmation::Continue);
    }

    #[test]
    fn test_checkpoint_labels() {
        let candidate = Candidate::default();
        let checkpoint = Checkpoint::Generated {
            round: 3,
            candidate: &candidate,
        };
        assert_eq!(checkpoint.round(), 3);
        assert_eq!(checkpoint.stage(), "generation");
    }
}
