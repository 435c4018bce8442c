use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use promptloops_backend::{create_backend, Backend, BackendConfig, BackendType};
use promptloops_core::{
    BackendGenerator, LoopContext, RefinementLoop, RefinementMode, ResultBundle, StopReason,
};
use promptloops_critic::{BackendCritic, ScoreScale};
use promptloops_logging::{init_tracing, LogFormat, Logger, SessionLine, SessionWriter};

mod config;
mod console;

use config::{LoopOverrides, ProjectConfig, ResolvedRole, Role, RoleOverrides};
use console::ConsoleInteraction;

/// Exit code for configuration and collaborator failures
const ERROR_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "promptloops",
    about = "Generator/critic refinement loop for prompts and LLM output",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    subcommand: Command,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refine a prompt through generate/critique rounds
    Refine(RefineArgs),
    /// Critique a single prompt once
    Critique(CritiqueArgs),
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// Prompt text (or reads from the prompt file if not provided)
    #[arg(short, long)]
    prompt: Option<String>,

    /// Path to prompt file (default: ./prompt.md)
    #[arg(long, default_value = "prompt.md")]
    prompt_file: PathBuf,
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// Backend to use for every role
    #[arg(short, long, value_enum)]
    backend: Option<BackendChoice>,

    /// Model to use (if the backend supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Command line for the `command` backend; reads the prompt on stdin
    #[arg(long)]
    command: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Scale the critic is asked to score on
    #[arg(long, value_enum)]
    critic_scale: Option<ScaleChoice>,
}

#[derive(Args, Debug)]
struct RefineArgs {
    #[command(flatten)]
    prompt: PromptArgs,

    #[command(flatten)]
    backend: BackendArgs,

    /// Backend to use specifically for the generator role
    #[arg(long, value_enum)]
    generator_backend: Option<BackendChoice>,

    /// Backend to use specifically for the critic role
    #[arg(long, value_enum)]
    critic_backend: Option<BackendChoice>,

    /// Model to use specifically for the generator role
    #[arg(long)]
    generator_model: Option<String>,

    /// Model to use specifically for the critic role
    #[arg(long)]
    critic_model: Option<String>,

    /// What the loop refines
    #[arg(long, value_enum)]
    mode: Option<ModeChoice>,

    /// Stop once a round scores at least this (0-100)
    #[arg(long)]
    min_score: Option<f64>,

    /// Maximum number of rounds
    #[arg(short = 'n', long)]
    max_attempts: Option<usize>,

    /// Consecutive non-improving rounds tolerated before stopping
    #[arg(long)]
    stagnation_threshold: Option<usize>,

    /// Answer the critic's clarifying questions yourself
    #[arg(long)]
    user_feedback: bool,

    /// Pause after each generation and critique
    #[arg(long)]
    confirm: bool,

    /// Also append loop events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not write a session transcript
    #[arg(long)]
    no_session: bool,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,
}

#[derive(Args, Debug)]
struct CritiqueArgs {
    #[command(flatten)]
    prompt: PromptArgs,

    #[command(flatten)]
    backend: BackendArgs,

    /// Output the review as JSON
    #[arg(long)]
    json_output: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendChoice {
    Claude,
    Opencode,
    Command,
}

impl From<BackendChoice> for BackendType {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Claude => BackendType::ClaudeCode,
            BackendChoice::Opencode => BackendType::OpenCode,
            BackendChoice::Command => BackendType::Command,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeChoice {
    Content,
    Reasoning,
}

impl From<ModeChoice> for RefinementMode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::Content => RefinementMode::Content,
            ModeChoice::Reasoning => RefinementMode::Reasoning,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScaleChoice {
    Percent,
    Unit,
}

impl From<ScaleChoice> for ScoreScale {
    fn from(choice: ScaleChoice) -> Self {
        match choice {
            ScaleChoice::Percent => ScoreScale::Percent,
            ScaleChoice::Unit => ScoreScale::Unit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
    Quiet,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
            LogFormatChoice::Quiet => LogFormat::Quiet,
        }
    }
}

/// Output of the `critique` subcommand
#[derive(Debug, Serialize)]
struct PromptReview {
    reasoning: String,
    score: f64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            std::process::exit(ERROR_EXIT_CODE);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let working_dir = match cli.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Backend CLIs inherit credentials from .env
    if let Err(e) = dotenvy::from_path(working_dir.join(".env")) {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }

    let project_config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    match cli.subcommand {
        Command::Refine(args) => {
            handle_refine(args, &project_config, &working_dir, log_format).await
        }
        Command::Critique(args) => handle_critique(args, &project_config, &working_dir).await,
    }
}

async fn handle_refine(
    args: RefineArgs,
    project_config: &ProjectConfig,
    working_dir: &Path,
    log_format: LogFormat,
) -> Result<i32> {
    let prompt = get_prompt(&args.prompt, working_dir)?;

    let generator_role = project_config.resolve_role(
        Role::Generator,
        RoleOverrides {
            backend: args
                .generator_backend
                .or(args.backend.backend)
                .map(Into::into),
            model: args.generator_model.or_else(|| args.backend.model.clone()),
            command: args.backend.command.clone(),
            timeout_secs: args.backend.timeout,
        },
    )?;
    let critic_role = project_config.resolve_role(
        Role::Critic,
        RoleOverrides {
            backend: args.critic_backend.or(args.backend.backend).map(Into::into),
            model: args.critic_model.or_else(|| args.backend.model.clone()),
            command: args.backend.command.clone(),
            timeout_secs: args.backend.timeout,
        },
    )?;
    let scale = resolve_scale(args.backend.critic_scale, project_config)?;

    let (options, mode) = project_config.resolve_loop(LoopOverrides {
        min_score: args.min_score,
        max_attempts: args.max_attempts,
        stagnation_threshold: args.stagnation_threshold,
        mode: args.mode.map(Into::into),
        require_user_feedback: args.user_feedback.then_some(true),
        require_user_confirmation: args.confirm.then_some(true),
    })?;
    options.validate()?;

    let generator_backend = open_backend(&generator_role, "Generator").await?;
    let critic_backend = open_backend(&critic_role, "Critic").await?;

    let generator = BackendGenerator::new(
        generator_backend.as_ref(),
        backend_config(&generator_role, working_dir),
    );
    let critic = BackendCritic::new(
        critic_backend.as_ref(),
        backend_config(&critic_role, working_dir),
    )
    .with_scale(scale);

    let logger = match args.log_file {
        Some(ref path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let session = if args.no_session {
        None
    } else {
        match SessionWriter::new(&prompt) {
            Ok(writer) => Some(writer),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create session file");
                None
            }
        }
    };
    if let Some(ref writer) = session {
        writer.write_line(&SessionLine::SessionStart {
            timestamp: Utc::now(),
            prompt: prompt.clone(),
            mode: mode.to_string(),
            generator_backend: generator_backend.name().to_string(),
            critic_backend: critic_backend.name().to_string(),
            min_score: options.min_score,
            max_attempts: options.max_attempts,
            stagnation_threshold: options.stagnation_threshold,
        });
    }

    let interaction = ConsoleInteraction;
    let mut runner = RefinementLoop::new(&generator, &critic, mode.composer(), Arc::new(logger));
    if options.is_interactive() {
        runner = runner.with_interaction(&interaction);
    }
    if let Some(ref writer) = session {
        runner = runner.with_session(writer);
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current round...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let bundle = runner.run(LoopContext::new(prompt, options)).await?;

    if let Some(ref writer) = session {
        tracing::info!(path = %writer.path().display(), "Session transcript written");
    }

    if args.json_output {
        let json = serde_json::to_string_pretty(&bundle)?;
        println!("{}", json);
    } else {
        print_outcome(&bundle);
    }

    Ok(bundle.exit_code())
}

async fn handle_critique(
    args: CritiqueArgs,
    project_config: &ProjectConfig,
    working_dir: &Path,
) -> Result<i32> {
    let prompt = get_prompt(&args.prompt, working_dir)?;

    let role = project_config.resolve_role(
        Role::Critic,
        RoleOverrides {
            backend: args.backend.backend.map(Into::into),
            model: args.backend.model,
            command: args.backend.command,
            timeout_secs: args.backend.timeout,
        },
    )?;
    let scale = resolve_scale(args.backend.critic_scale, project_config)?;

    let backend = open_backend(&role, "Critic").await?;
    let critic = BackendCritic::new(backend.as_ref(), backend_config(&role, working_dir))
        .with_scale(scale);

    let verdict = critic.review_prompt(&prompt).await?;
    let review = PromptReview {
        score: verdict.effective_score(),
        reasoning: verdict.critique,
    };

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&review)?);
    } else {
        eprintln!("{}", format!("Score: {:.1}", review.score).bold());
        println!("{}", review.reasoning);
    }

    Ok(0)
}

fn resolve_scale(cli: Option<ScaleChoice>, project_config: &ProjectConfig) -> Result<ScoreScale> {
    Ok(match cli {
        Some(choice) => choice.into(),
        None => project_config.critic_scale()?.unwrap_or_default(),
    })
}

/// Create the backend for a role and verify it can be launched
async fn open_backend(role: &ResolvedRole, label: &str) -> Result<Box<dyn Backend>> {
    let backend = create_backend(role.backend, role.command.as_deref())
        .with_context(|| format!("Failed to create {} backend", label.to_lowercase()))?;

    if !backend.is_available().await {
        anyhow::bail!(
            "{} backend '{}' is not available. Make sure it's installed and in PATH.",
            label,
            backend.name()
        );
    }
    Ok(backend)
}

fn backend_config(role: &ResolvedRole, working_dir: &Path) -> BackendConfig {
    let mut config = BackendConfig::new(working_dir.to_path_buf());
    if let Some(ref model) = role.model {
        config = config.with_model(model.clone());
    }
    if let Some(timeout) = role.timeout {
        config = config.with_timeout(timeout);
    }
    config
}

fn get_prompt(args: &PromptArgs, working_dir: &Path) -> Result<String> {
    // Prefer --prompt flag
    if let Some(ref prompt) = args.prompt {
        return Ok(prompt.clone());
    }

    let prompt_path = if args.prompt_file.is_absolute() {
        args.prompt_file.clone()
    } else {
        working_dir.join(&args.prompt_file)
    };

    if prompt_path.exists() {
        let content =
            std::fs::read_to_string(&prompt_path).context("Failed to read prompt file")?;
        Ok(content.trim().to_string())
    } else {
        anyhow::bail!(
            "No prompt provided. Use --prompt or create a {} file",
            args.prompt_file.display()
        )
    }
}

fn print_outcome(bundle: &ResultBundle) {
    let banner = match bundle.reason_to_stop {
        StopReason::DesiredScoreReached => "=== SUCCESS ===".bright_green(),
        StopReason::MaxAttemptsReached => "=== INCOMPLETE ===".yellow(),
        StopReason::NoImprovement => "=== STALLED ===".yellow(),
        StopReason::UserTerminated => "=== INTERRUPTED ===".bright_yellow(),
    };

    eprintln!();
    eprintln!("{}", banner.bold());
    eprintln!("Reason: {}", bundle.reason_to_stop);
    eprintln!("Rounds: {}", bundle.rounds);
    eprintln!("Final score: {:.1}", bundle.final_score);
    eprintln!("Duration: {:.1}s", bundle.total_duration_secs);
    if let Some(ref feedback) = bundle.user_feedback_incorporated {
        eprintln!("Feedback incorporated: {} item(s)", feedback.len());
    }
    eprintln!();
    println!("{}", bundle.final_content);
}
