use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        prompt: String,
        mode: String,
        generator_backend: String,
        critic_backend: String,
        min_score: f64,
        max_attempts: usize,
        stagnation_threshold: usize,
    },
    Round {
        round: usize,
        score: Option<f64>,
        critique: String,
        clarifying_questions: Vec<String>,
        follow_up_suggestions: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        reason: String,
        rounds: usize,
        final_score: f64,
        final_content: String,
        user_feedback: Option<Vec<String>>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
    /// Written instead of `session_end` when a collaborator error aborts the run
    SessionFailed {
        round: usize,
        error: String,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Writes session data as JSONL to a file in ~/.local/share/promptloops/sessions/.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionWriter {
    /// Create a writer in the default sessions directory.
    pub fn new(prompt: &str) -> io::Result<Self> {
        Self::create_in(&Self::sessions_dir()?, prompt)
    }

    /// Create a writer in `dir`. The file name combines the current UTC
    /// timestamp with a short hash of the prompt.
    pub fn create_in(dir: &Path, prompt: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let path = dir.join(format!("{}_{}.jsonl", timestamp_str, &hash[..6]));
        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Failures are swallowed; a transcript must never
    /// abort a run.
    pub fn write_line(&self, line: &SessionLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("promptloops").join("sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_jsonl_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionWriter::create_in(dir.path(), "write a haiku").unwrap();

        let name = writer.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jsonl"));
        assert_eq!(name.rsplit('_').next().unwrap().len(), "abcdef.jsonl".len());

        writer.write_line(&SessionLine::SessionStart {
            timestamp: Utc::now(),
            prompt: "write a haiku".into(),
            mode: "content".into(),
            generator_backend: "claude".into(),
            critic_backend: "claude".into(),
            min_score: 85.0,
            max_attempts: 6,
            stagnation_threshold: 3,
        });
        writer.write_line(&SessionLine::Round {
            round: 1,
            score: None,
            critique: String::new(),
            clarifying_questions: vec![],
            follow_up_suggestions: vec![],
            timestamp: Utc::now(),
        });
        writer.write_line(&SessionLine::SessionEnd {
            reason: "maximum attempts reached".into(),
            rounds: 1,
            final_score: 0.0,
            final_content: "an old pond".into(),
            user_feedback: None,
            duration_secs: 1.5,
            timestamp: Utc::now(),
        });

        let content = fs::read_to_string(writer.path()).unwrap();
        let types: Vec<String> = content
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(types, vec!["session_start", "round", "session_end"]);
    }
}
