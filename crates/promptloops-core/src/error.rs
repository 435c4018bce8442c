use thiserror::Error;

use crate::{GenerationError, InteractionError};

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Generator error: {0}")]
    GeneratorError(#[from] GenerationError),

    #[error("Critic error: {0}")]
    CriticError(#[from] promptloops_critic::CritiqueError),

    #[error("Interaction error: {0}")]
    InteractionError(#[from] InteractionError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
