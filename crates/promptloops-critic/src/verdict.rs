use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

/// Upper bound of the normalized score scale.
pub const MAX_SCORE: f64 = 100.0;

/// The critic's structured judgement of one candidate
///
/// Expected wire shape (keys also accepted in PascalCase, and
/// `reasoningScore` / `reasoning` as score / critique aliases):
///
/// ```text
/// {"critique": "...", "score": 72, "clarifyingQuestions": ["..."], "followUpSuggestions": ["..."]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Free-text explanation of strengths and weaknesses
    #[serde(
        default,
        alias = "Critique",
        alias = "reasoning",
        deserialize_with = "null_as_default"
    )]
    pub critique: String,
    /// Score on the normalized 0-100 scale once it has passed through a critic
    #[serde(
        default,
        alias = "Score",
        alias = "reasoningScore",
        alias = "ReasoningScore",
        deserialize_with = "lenient_score"
    )]
    pub score: Option<f64>,
    #[serde(
        default,
        alias = "ClarifyingQuestions",
        alias = "clarifying_questions",
        deserialize_with = "null_as_default"
    )]
    pub clarifying_questions: Vec<String>,
    #[serde(
        default,
        alias = "FollowUpSuggestions",
        alias = "follow_up_suggestions",
        deserialize_with = "null_as_default"
    )]
    pub follow_up_suggestions: Vec<String>,
}

#[derive(Error, Debug)]
pub enum VerdictParseError {
    #[error("No verdict JSON found in critic output")]
    NoVerdictFound,

    #[error("Failed to parse verdict JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid verdict format: {0}")]
    InvalidFormat(String),
}

impl Verdict {
    /// Parse a verdict from raw critic output.
    ///
    /// Looks, in order, for a `<verdict>` block, a fenced ```json block,
    /// and finally the outermost `{ ... }` span of the text.
    pub fn parse(critic_output: &str) -> Result<Self, VerdictParseError> {
        debug!(output_len = critic_output.len(), "Parsing critic verdict");

        if let Some(json) = Self::tagged_block(critic_output)? {
            debug!("Found verdict block");
            return Ok(serde_json::from_str(json)?);
        }

        if let Some(json) = Self::fenced_block(critic_output) {
            debug!("Found fenced JSON block");
            return Ok(serde_json::from_str(json)?);
        }

        match (critic_output.find('{'), critic_output.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                Ok(serde_json::from_str(&critic_output[start..=end])?)
            }
            _ => Err(VerdictParseError::NoVerdictFound),
        }
    }

    /// Body of the last `<verdict>...</verdict>` pair. Earlier mentions of
    /// the opening tag in prose are skipped.
    fn tagged_block(output: &str) -> Result<Option<&str>, VerdictParseError> {
        const OPEN: &str = "<verdict>";
        const CLOSE: &str = "</verdict>";

        let Some(end) = output.rfind(CLOSE) else {
            return Ok(None);
        };

        match output[..end].rfind(OPEN) {
            Some(start) => Ok(Some(output[start + OPEN.len()..end].trim())),
            None if output.contains(OPEN) => Err(VerdictParseError::InvalidFormat(
                "Malformed verdict block".to_string(),
            )),
            None => Ok(None),
        }
    }

    fn fenced_block(output: &str) -> Option<&str> {
        let start = output.find("```json")? + "```json".len();
        let len = output[start..].find("```")?;
        Some(output[start..start + len].trim())
    }

    /// Score used for threshold and stagnation comparisons; absent is 0
    pub fn effective_score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    pub fn has_questions(&self) -> bool {
        !self.clarifying_questions.is_empty()
    }

    pub fn joined_questions(&self) -> String {
        self.clarifying_questions.join("\n")
    }

    pub fn joined_suggestions(&self) -> String {
        self.follow_up_suggestions.join("\n")
    }

    /// Rescale the raw score onto 0-100
    pub fn normalized(mut self, scale: ScoreScale) -> Self {
        self.score = self.score.map(|raw| scale.normalize(raw));
        self
    }

    /// Get a short description of the verdict for logging
    pub fn short_description(&self) -> String {
        let score = match self.score {
            Some(score) => format!("score {:.1}", score),
            None => "no score".to_string(),
        };
        match self.clarifying_questions.len() {
            0 => score,
            1 => format!("{} (1 question)", score),
            n => format!("{} ({} questions)", score, n),
        }
    }
}

/// Range the critic model was asked to score on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreScale {
    /// 0 to 100
    #[default]
    Percent,
    /// 0 to 1
    Unit,
}

impl ScoreScale {
    /// Map a raw score onto 0-100, clamping out-of-range values
    pub fn normalize(self, raw: f64) -> f64 {
        let scaled = match self {
            ScoreScale::Percent => raw,
            ScoreScale::Unit => raw * MAX_SCORE,
        };
        if scaled.is_nan() {
            0.0
        } else {
            scaled.clamp(0.0, MAX_SCORE)
        }
    }

    /// Human-readable range for prompt templates
    pub fn range(self) -> &'static str {
        match self {
            ScoreScale::Percent => "0 to 100",
            ScoreScale::Unit => "0 to 1",
        }
    }
}

impl std::fmt::Display for ScoreScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreScale::Percent => write!(f, "percent"),
            ScoreScale::Unit => write!(f, "unit"),
        }
    }
}

impl std::str::FromStr for ScoreScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "percent" | "100" | "0-100" => Ok(ScoreScale::Percent),
            "unit" | "1" | "0-1" => Ok(ScoreScale::Unit),
            _ => Err(format!("Unknown score scale: {}", s)),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts numbers, numeric strings ("85", "0.7") and null. Non-finite
/// values ("inf", "NaN") are rejected.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Number(f64),
        Text(String),
    }

    match Option::<RawScore>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawScore::Number(n)) => Ok(Some(n)),
        Some(RawScore::Text(text)) => {
            let text = text.trim().trim_end_matches('%').trim();
            if text.is_empty() {
                return Ok(None);
            }
            match text.parse::<f64>() {
                Ok(score) if score.is_finite() => Ok(Some(score)),
                _ => Err(serde::de::Error::custom(format!(
                    "score is not a finite number: {}",
                    text
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_block() {
        let output = r#"
The draft is vague about the audience.

<verdict>
{"critique": "Needs an audience", "score": 42, "clarifyingQuestions": ["Who reads this?"], "followUpSuggestions": ["Name the reader"]}
</verdict>
"#;

        let verdict = Verdict::parse(output).unwrap();
        assert_eq!(verdict.critique, "Needs an audience");
        assert_eq!(verdict.score, Some(42.0));
        assert_eq!(verdict.clarifying_questions, vec!["Who reads this?"]);
        assert_eq!(verdict.follow_up_suggestions, vec!["Name the reader"]);
    }

    #[test]
    fn test_parse_pascal_case_keys() {
        let output = r#"{"Critique": "ok", "Score": 85, "ClarifyingQuestions": [], "FollowUpSuggestions": ["tighten"]}"#;
        let verdict = Verdict::parse(output).unwrap();
        assert_eq!(verdict.critique, "ok");
        assert_eq!(verdict.score, Some(85.0));
        assert!(!verdict.has_questions());
        assert_eq!(verdict.joined_suggestions(), "tighten");
    }

    #[test]
    fn test_parse_reasoning_score_alias() {
        let output = r#"{"critique": "steps skip a case", "reasoningScore": 61.5, "clarifyingQuestions": []}"#;
        let verdict = Verdict::parse(output).unwrap();
        assert_eq!(verdict.score, Some(61.5));
    }

    #[test]
    fn test_parse_fenced_json() {
        let output = "Here you go:\n```json\n{\"critique\": \"fine\", \"score\": \"70\"}\n```\nThanks";
        let verdict = Verdict::parse(output).unwrap();
        assert_eq!(verdict.score, Some(70.0));
    }

    #[test]
    fn test_parse_embedded_object() {
        let output = "Verdict follows {\"critique\": null, \"score\": 10} end";
        let verdict = Verdict::parse(output).unwrap();
        assert_eq!(verdict.critique, "");
        assert_eq!(verdict.score, Some(10.0));
    }

    #[test]
    fn test_missing_fields_are_defaulted() {
        let verdict = Verdict::parse("{}").unwrap();
        assert_eq!(verdict, Verdict::default());
        assert_eq!(verdict.effective_score(), 0.0);
    }

    #[test]
    fn test_parse_no_verdict() {
        let result = Verdict::parse("I refuse to answer in JSON.");
        assert!(matches!(result, Err(VerdictParseError::NoVerdictFound)));
    }

    #[test]
    fn test_parse_malformed_block() {
        let result = Verdict::parse("</verdict> oops <verdict>");
        assert!(matches!(result, Err(VerdictParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_non_numeric_score_is_rejected() {
        let result = Verdict::parse(r#"{"score": "great"}"#);
        assert!(matches!(result, Err(VerdictParseError::JsonParseError(_))));
    }

    #[test]
    fn test_tag_mentioned_in_prose_before_block() {
        let output = "I'll wrap my answer in a <verdict> block.\n<verdict>{\"critique\":\"ok\",\"score\":50}</verdict>";
        let verdict = Verdict::parse(output).unwrap();
        assert_eq!(verdict.critique, "ok");
        assert_eq!(verdict.score, Some(50.0));
    }

    #[test]
    fn test_non_finite_score_is_rejected() {
        for raw in ["inf", "-Infinity", "NaN"] {
            let result = Verdict::parse(&format!(r#"{{"score": "{}"}}"#, raw));
            assert!(
                matches!(result, Err(VerdictParseError::JsonParseError(_))),
                "accepted {}",
                raw
            );
        }
    }

    #[test]
    fn test_unit_scale_normalization() {
        let verdict = Verdict {
            score: Some(0.72),
            ..Default::default()
        }
        .normalized(ScoreScale::Unit);
        assert!((verdict.effective_score() - 72.0).abs() < 1e-9);

        assert_eq!(ScoreScale::Percent.normalize(140.0), MAX_SCORE);
        assert_eq!(ScoreScale::Percent.normalize(-3.0), 0.0);
        assert_eq!(ScoreScale::Unit.normalize(f64::NAN), 0.0);
    }

    #[test]
    fn test_joined_questions_and_description() {
        let verdict = Verdict {
            critique: String::new(),
            score: Some(50.0),
            clarifying_questions: vec!["Tone?".into(), "Length?".into()],
            follow_up_suggestions: vec![],
        };
        assert_eq!(verdict.joined_questions(), "Tone?\nLength?");
        assert_eq!(verdict.short_description(), "score 50.0 (2 questions)");
    }
}
