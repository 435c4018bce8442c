use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use promptloops_critic::Critic;
use promptloops_logging::{AgentRole, LogEvent, Logger, SessionLine, SessionWriter};

use crate::{
    Checkpoint, Confirmation, FeedbackComposer, Generator, Interaction, LoopContext, LoopError,
    ResultBundle, StopReason,
};

/// Drives the generator/critic loop until a stop condition fires
pub struct RefinementLoop<'a> {
    generator: &'a dyn Generator,
    critic: &'a dyn Critic,
    composer: Box<dyn FeedbackComposer>,
    interaction: Option<&'a dyn Interaction>,
    logger: Arc<Logger>,
    session: Option<&'a SessionWriter>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        critic: &'a dyn Critic,
        composer: Box<dyn FeedbackComposer>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator,
            critic,
            composer,
            interaction: None,
            logger,
            session: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Port used for confirmations and clarifying questions
    pub fn with_interaction(mut self, interaction: &'a dyn Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }

    /// Transcript that receives a line per round as it completes, then
    /// `session_end` (or `session_failed`)
    pub fn with_session(mut self, session: &'a SessionWriter) -> Self {
        self.session = Some(session);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Run rounds until a stop condition fires.
    ///
    /// Generator, critic and interaction failures abort the run; no partial
    /// result is returned.
    pub async fn run(&self, mut context: LoopContext) -> Result<ResultBundle, LoopError> {
        context.options.validate()?;
        if context.options.is_interactive() && self.interaction.is_none() {
            return Err(LoopError::ConfigError(
                "user feedback or confirmation requested but no interaction port was provided"
                    .to_string(),
            ));
        }

        self.logger.log(&LogEvent::LoopStarted {
            prompt: context.prompt.clone(),
            mode: self.composer.mode().to_string(),
            min_score: context.options.min_score,
            max_attempts: context.options.max_attempts,
            stagnation_threshold: context.options.stagnation_threshold,
        });

        let reason = match self.drive(&mut context).await {
            Ok(reason) => reason,
            Err(e) => {
                self.record(&SessionLine::SessionFailed {
                    round: context.round(),
                    error: e.to_string(),
                    duration_secs: context.total_duration().as_secs_f64(),
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };
        context.termination.stop(reason);

        let bundle = ResultBundle::assemble(context, reason);

        self.logger.log(&LogEvent::LoopFinished {
            reason: reason.to_string(),
            rounds: bundle.rounds,
            final_score: bundle.final_score,
            duration_secs: bundle.total_duration_secs,
        });
        self.record(&SessionLine::SessionEnd {
            reason: reason.to_string(),
            rounds: bundle.rounds,
            final_score: bundle.final_score,
            final_content: bundle.final_content.clone(),
            user_feedback: bundle.user_feedback_incorporated.clone(),
            duration_secs: bundle.total_duration_secs,
            timestamp: Utc::now(),
        });

        Ok(bundle)
    }

    /// Run rounds until one of them yields a stop reason
    async fn drive(&self, context: &mut LoopContext) -> Result<StopReason, LoopError> {
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("Loop interrupted by user");
                return Ok(StopReason::UserTerminated);
            }

            if !context.termination.begin_round(context.options.max_attempts) {
                return Ok(StopReason::MaxAttemptsReached);
            }

            if let Some(reason) = self.run_round(context).await? {
                return Ok(reason);
            }
        }
    }

    /// Run one generate-then-critique round.
    /// Returns Some(reason) if the loop should stop, None to continue.
    async fn run_round(&self, context: &mut LoopContext) -> Result<Option<StopReason>, LoopError> {
        let round = context.round();

        // Generate
        let request = self.composer.generation_request(context);
        self.logger.log(&LogEvent::GenerationStarted { round });
        debug!(round, subject_len = request.subject.len(), "Running generator");

        let generation = self
            .generator
            .generate(&request)
            .await
            .inspect_err(|e| self.log_error(round, AgentRole::Generator, e))?;

        let candidate = self.composer.absorb(context.candidate.take(), generation);
        self.logger.log(&LogEvent::GenerationCompleted {
            round,
            content_chars: candidate.content.chars().count(),
            reasoning_chars: candidate.reasoning.as_ref().map(|r| r.chars().count()),
            content_preview: candidate.content.chars().take(300).collect(),
        });

        if context.options.require_user_confirmation {
            let checkpoint = Checkpoint::Generated {
                round,
                candidate: &candidate,
            };
            if self.confirm(checkpoint).await? == Confirmation::Stop {
                context.candidate = Some(candidate);
                return Ok(Some(StopReason::UserTerminated));
            }
        }

        // Critique
        let critique_request = self.composer.critique_request(context, &candidate);
        context.candidate = Some(candidate);
        self.logger.log(&LogEvent::CritiqueStarted { round });

        let verdict = self
            .critic
            .critique(&critique_request)
            .await
            .inspect_err(|e| self.log_error(round, AgentRole::Critic, e))?;

        let score = verdict.effective_score();
        self.logger.log(&LogEvent::CritiqueCompleted {
            round,
            score,
            verdict: verdict.short_description(),
        });

        self.record(&SessionLine::Round {
            round,
            score: verdict.score,
            critique: verdict.critique.clone(),
            clarifying_questions: verdict.clarifying_questions.clone(),
            follow_up_suggestions: verdict.follow_up_suggestions.clone(),
            timestamp: Utc::now(),
        });

        let has_questions = verdict.has_questions();
        let questions = verdict.clarifying_questions.clone();
        let forwarded = verdict.joined_questions();
        context.history.push(verdict);

        // Termination
        let previous_score = context.termination.previous_score;
        context.termination.record_score(score);
        self.logger.log(&LogEvent::StagnationUpdated {
            round,
            score,
            previous_score,
            stagnation_counter: context.termination.stagnation_counter,
        });

        if let Some(reason) = context.termination.evaluate(score, &context.options) {
            return Ok(Some(reason));
        }

        // Feedback routing
        if !has_questions {
            context.pending_feedback.clear();
            self.logger.log(&LogEvent::FeedbackRouted {
                round,
                source: AgentRole::Critic,
                chars: 0,
            });
        } else {
            let (feedback, source) = if context.options.require_user_feedback {
                let answer = self
                    .interaction()?
                    .ask(round, &questions)
                    .await
                    .inspect_err(|e| self.log_error(round, AgentRole::User, e))?;
                (answer, AgentRole::User)
            } else {
                (forwarded, AgentRole::Critic)
            };
            self.logger.log(&LogEvent::FeedbackRouted {
                round,
                source,
                chars: feedback.chars().count(),
            });
            context.feedback_log.push(feedback.clone());
            context.pending_feedback = feedback;
        }

        if context.options.require_user_confirmation {
            if let Some(verdict) = context.history.latest() {
                let checkpoint = Checkpoint::Critiqued { round, verdict };
                if self.confirm(checkpoint).await? == Confirmation::Stop {
                    return Ok(Some(StopReason::UserTerminated));
                }
            }
        }

        Ok(None)
    }

    async fn confirm(&self, checkpoint: Checkpoint<'_>) -> Result<Confirmation, LoopError> {
        let round = checkpoint.round();
        let stage = checkpoint.stage();
        let confirmation = self
            .interaction()?
            .confirm(checkpoint)
            .await
            .inspect_err(|e| self.log_error(round, AgentRole::User, e))?;

        self.logger.log(&LogEvent::UserCheckpoint {
            round,
            stage: stage.to_string(),
            stopped: confirmation == Confirmation::Stop,
        });
        Ok(confirmation)
    }

    fn record(&self, line: &SessionLine) {
        if let Some(session) = self.session {
            session.write_line(line);
        }
    }

    fn interaction(&self) -> Result<&'a dyn Interaction, LoopError> {
        self.interaction
            .ok_or_else(|| LoopError::ConfigError("no interaction port configured".to_string()))
    }

    fn log_error(&self, round: usize, role: AgentRole, error: &dyn std::fmt::Display) {
        self.logger.log(&LogEvent::ErrorEncountered {
            round,
            role,
            error: error.to_string(),
        });
    }
}
