mod evaluator;
mod prompts;
mod verdict;

pub use evaluator::{BackendCritic, Critic, CritiqueError, CritiqueRequest};
pub use prompts::CriticPrompts;
pub use verdict::{ScoreScale, Verdict, VerdictParseError, MAX_SCORE};
