//! Terminal implementation of the loop's interaction port.

use async_trait::async_trait;
use colored::Colorize;
use dialoguer::Input;

use promptloops_core::{Checkpoint, Confirmation, Interaction, InteractionError, STOP_SENTINEL};

/// Prompts on the terminal with dialoguer
pub struct ConsoleInteraction;

#[async_trait]
impl Interaction for ConsoleInteraction {
    async fn confirm(&self, checkpoint: Checkpoint<'_>) -> Result<Confirmation, InteractionError> {
        eprintln!();
        match checkpoint {
            Checkpoint::Generated { round, candidate } => {
                eprintln!("{}", format!("--- Round {} candidate ---", round).bold());
                if let Some(ref reasoning) = candidate.reasoning {
                    eprintln!("{}", "Reasoning:".dimmed());
                    eprintln!("{}", reasoning);
                    eprintln!();
                }
                eprintln!("{}", candidate.content);
            }
            Checkpoint::Critiqued { round, verdict } => {
                eprintln!("{}", format!("--- Round {} critique ---", round).bold());
                eprintln!("Score: {:.1}", verdict.effective_score());
                eprintln!("{}", verdict.critique);
            }
        }

        let reply = read_line(format!(
            "Press Enter to continue, or type '{}' to end",
            STOP_SENTINEL
        ))
        .await?;
        Ok(Confirmation::from_reply(&reply))
    }

    async fn ask(&self, round: usize, questions: &[String]) -> Result<String, InteractionError> {
        eprintln!();
        eprintln!(
            "{}",
            format!("The critic has questions (round {}):", round).bright_cyan()
        );
        for question in questions {
            eprintln!("  - {}", question);
        }
        read_line("Your answer".to_string()).await
    }
}

/// Read one line without blocking the runtime
async fn read_line(prompt: String) -> Result<String, InteractionError> {
    tokio::task::spawn_blocking(move || {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
    })
    .await
    .map_err(|e| InteractionError::Closed(e.to_string()))?
    .map_err(|e| InteractionError::Closed(e.to_string()))
}
