use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text returned by a backend call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Model output (process stdout)
    pub text: String,
    /// Diagnostics written by the backend (process stderr)
    pub stderr: String,
    /// Exit code from the process
    pub exit_code: i32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl Completion {
    pub fn new(text: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            text,
            stderr,
            exit_code,
            duration,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Output with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }

    pub fn text_lines(&self) -> usize {
        self.text.lines().count()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
