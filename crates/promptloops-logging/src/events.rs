use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Which collaborator an event concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Generator,
    Critic,
    User,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Generator => write!(f, "generator"),
            AgentRole::Critic => write!(f, "critic"),
            AgentRole::User => write!(f, "user"),
        }
    }
}

/// Structured log events for the refinement loop. Rounds are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    LoopStarted {
        prompt: String,
        mode: String,
        min_score: f64,
        max_attempts: usize,
        stagnation_threshold: usize,
    },
    GenerationStarted {
        round: usize,
    },
    GenerationCompleted {
        round: usize,
        content_chars: usize,
        reasoning_chars: Option<usize>,
        content_preview: String,
    },
    /// The user was asked to confirm or stop
    UserCheckpoint {
        round: usize,
        stage: String,
        stopped: bool,
    },
    CritiqueStarted {
        round: usize,
    },
    CritiqueCompleted {
        round: usize,
        score: f64,
        verdict: String,
    },
    StagnationUpdated {
        round: usize,
        score: f64,
        previous_score: f64,
        stagnation_counter: usize,
    },
    /// Text forwarded to the next generation as feedback
    FeedbackRouted {
        round: usize,
        source: AgentRole,
        chars: usize,
    },
    LoopFinished {
        reason: String,
        rounds: usize,
        final_score: f64,
        duration_secs: f64,
    },
    ErrorEncountered {
        round: usize,
        role: AgentRole,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
    /// No console output (file sink only)
    Quiet,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            "quiet" | "none" => Ok(LogFormat::Quiet),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for loop events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
            LogFormat::Quiet => {}
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::LoopStarted {
                prompt,
                mode,
                min_score,
                max_attempts,
                stagnation_threshold,
            } => {
                let rule = "─".repeat(69);
                let _ = writeln!(stderr);
                let _ = writeln!(stderr, "{}", format!("╭{}╮", rule).bright_blue());
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "promptloops".bold().bright_white(),
                    " ".repeat(56) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Prompt:".dimmed(),
                    Self::truncate_with_padding(prompt, 60, 68).dimmed()
                );
                let settings = format!(
                    "{} mode, target {:.0}, {} attempts, stagnation {}",
                    mode, min_score, max_attempts, stagnation_threshold
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Loop:".dimmed(),
                    Self::truncate_with_padding(&settings, 62, 68).dimmed()
                );
                let _ = writeln!(stderr, "{}", format!("╰{}╯", rule).bright_blue());
                let _ = writeln!(stderr);
            }
            LogEvent::GenerationStarted { round } => {
                let round_text = format!("─ Round {} ", round);
                let padding = "─".repeat(67usize.saturating_sub(round_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    round_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    "GENERATOR".bright_cyan().bold()
                );
            }
            LogEvent::GenerationCompleted {
                content_chars,
                reasoning_chars,
                content_preview,
                ..
            } => {
                let extra = match reasoning_chars {
                    Some(n) => format!(", reasoning {} chars", n),
                    None => String::new(),
                };
                let _ = writeln!(
                    stderr,
                    "    {} {} chars{}",
                    "✓".bright_green(),
                    content_chars,
                    extra
                );
                for line in content_preview.lines().take(4) {
                    let _ = writeln!(stderr, "{} {}", "    │".dimmed(), line.dimmed());
                }
                let _ = writeln!(stderr);
            }
            LogEvent::UserCheckpoint { stage, stopped, .. } => {
                if *stopped {
                    let _ = writeln!(
                        stderr,
                        "    {} Stopped by user after {}",
                        "■".bright_red(),
                        stage
                    );
                }
            }
            LogEvent::CritiqueStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "CRITIC".bright_magenta().bold()
                );
            }
            LogEvent::CritiqueCompleted { verdict, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {}",
                    format!("→ Verdict: {}", verdict).bright_yellow()
                );
            }
            LogEvent::StagnationUpdated {
                stagnation_counter, ..
            } => {
                if *stagnation_counter > 0 {
                    let _ = writeln!(
                        stderr,
                        "    {} No improvement ({} in a row)",
                        "⚠".bright_yellow(),
                        stagnation_counter
                    );
                }
            }
            LogEvent::FeedbackRouted { source, chars, .. } => {
                if *chars > 0 {
                    let _ = writeln!(
                        stderr,
                        "    {} {}",
                        "↺".dimmed(),
                        format!("Forwarding {} chars of {} feedback", chars, source).dimmed()
                    );
                }
                let _ = writeln!(stderr);
                let _ = writeln!(stderr, "{}", format!("└{}┘", "─".repeat(69)).bright_blue());
                let _ = writeln!(stderr);
            }
            LogEvent::LoopFinished { .. } => {
                // The final result is printed by the binary
            }
            LogEvent::ErrorEncountered { round, role, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} failed in round {}: {}",
                    "✗".bright_red(),
                    role,
                    round,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::LoopStarted { mode, .. } => format!("[{}] loop:start {}", timestamp, mode),
            LogEvent::GenerationStarted { round } => {
                format!("[{}] generate:start:{}", timestamp, round)
            }
            LogEvent::GenerationCompleted {
                round,
                content_chars,
                ..
            } => format!("[{}] generate:done:{} {}c", timestamp, round, content_chars),
            LogEvent::UserCheckpoint {
                round,
                stage,
                stopped,
            } => format!(
                "[{}] user:{}:{} {}",
                timestamp,
                stage,
                round,
                if *stopped { "stop" } else { "continue" }
            ),
            LogEvent::CritiqueStarted { round } => {
                format!("[{}] critic:start:{}", timestamp, round)
            }
            LogEvent::CritiqueCompleted { round, score, .. } => {
                format!("[{}] critic:done:{} score={:.1}", timestamp, round, score)
            }
            LogEvent::StagnationUpdated {
                round,
                stagnation_counter,
                ..
            } => format!("[{}] stagnation:{} {}", timestamp, round, stagnation_counter),
            LogEvent::FeedbackRouted {
                round,
                source,
                chars,
            } => format!("[{}] feedback:{} {} {}c", timestamp, round, source, chars),
            LogEvent::LoopFinished {
                reason,
                rounds,
                final_score,
                duration_secs,
            } => format!(
                "[{}] loop:done:{} score={:.1} {:.1}s {}",
                timestamp, rounds, final_score, duration_secs, reason
            ),
            LogEvent::ErrorEncountered { round, role, error } => {
                format!("[{}] error:{}:{}:{}", timestamp, role, round, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let first_line = s.lines().next().unwrap_or_default();
        let truncated = if first_line.chars().count() > max_len {
            let head: String = first_line.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            first_line.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_tag() {
        let event = LogEvent::CritiqueCompleted {
            round: 2,
            score: 64.0,
            verdict: "score 64.0".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "critique_completed");
        assert_eq!(json["round"], 2);
    }

    #[test]
    fn test_file_sink_writes_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("loop.jsonl");
        let logger = Logger::with_file(LogFormat::Quiet, &path).unwrap();

        logger.log(&LogEvent::GenerationStarted { round: 1 });
        logger.log(&LogEvent::FeedbackRouted {
            round: 1,
            source: AgentRole::Critic,
            chars: 12,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "generation_started");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["source"], "critic");
    }

    #[test]
    fn test_truncate_with_padding_handles_multibyte() {
        let padded = Logger::truncate_with_padding("résumé ".repeat(20).as_str(), 10, 20);
        assert!(padded.ends_with('│'));
        assert_eq!(padded.chars().count(), 20);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("none".parse::<LogFormat>().unwrap(), LogFormat::Quiet);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
