//! # promptloops-core
//!
//! The refinement loop: a [`Generator`] drafts, a
//! [`Critic`](promptloops_critic::Critic) scores, and [`RefinementLoop`]
//! decides after every round whether to stop. What the generator is shown
//! each round is decided by a [`FeedbackComposer`].

mod composer;
mod context;
mod error;
mod generator;
mod interaction;
mod loop_runner;
mod outcome;
mod prompts;
mod termination;

pub use composer::{ContentComposer, FeedbackComposer, ReasoningComposer, RefinementMode};
pub use context::{Candidate, History, LoopContext, LoopOptions};
pub use error::LoopError;
pub use generator::{BackendGenerator, Generation, GenerationError, GenerationRequest, Generator};
pub use interaction::{Checkpoint, Confirmation, Interaction, InteractionError, STOP_SENTINEL};
pub use loop_runner::RefinementLoop;
pub use outcome::ResultBundle;
pub use prompts::GeneratorPrompts;
pub use termination::{StopReason, TerminationState};
