use crate::ScoreScale;

/// Prompt templates for the critic
pub struct CriticPrompts;

impl CriticPrompts {
    /// Critique of a generated piece of content
    pub fn build_content_prompt(content: &str, round: usize, scale: ScoreScale) -> String {
        format!(
            r#"You are an expert critic specializing in content quality assessment. Provide a comprehensive, actionable and constructive critique of the content below so that it becomes clearer, more engaging and more effective at its purpose.

## Content (round {round})
{content}

{format}"#,
            round = round,
            content = content,
            format = Self::response_format(scale),
        )
    }

    /// Critique of a reasoning trace, with the earlier rounds for context
    pub fn build_reasoning_prompt(
        content: &str,
        reasoning: &str,
        history: Option<&str>,
        round: usize,
        scale: ScoreScale,
    ) -> String {
        let history = match history {
            Some(h) if !h.trim().is_empty() => h,
            _ => "(first round)",
        };
        format!(
            r#"You are a rigorous reviewer of step-by-step reasoning. Judge whether each step follows from the previous ones, whether any case is missed, and whether the final answer is supported by the chain of thought.

## Chain of Thought (round {round})
{reasoning}

## Final Answer
{content}

## Earlier Critiques and Scores
```json
{history}
```

Score the quality of the reasoning itself.

{format}"#,
            round = round,
            reasoning = truncate_output(reasoning, 20000),
            content = content,
            history = truncate_output(history, 10000),
            format = Self::response_format(scale),
        )
    }

    /// One-shot review of a prompt meant for another model
    pub fn build_prompt_review(prompt: &str, scale: ScoreScale) -> String {
        format!(
            r#"You are a prompt critique assistant. Evaluate the prompt below for clarity, completeness, actionability, use of techniques such as step-by-step reasoning, and alignment with the likely intent. Score each aspect, then average them into one final score and explain the breakdown in the critique.

## Prompt
{prompt}

{format}"#,
            prompt = prompt,
            format = Self::response_format(scale),
        )
    }

    fn response_format(scale: ScoreScale) -> String {
        format!(
            r#"## Required Response Format

End your response with a verdict block containing a single JSON object:

<verdict>
{{"critique": "What works and what does not, with specific examples", "score": <number from {range}>, "clarifyingQuestions": ["Questions whose answers would let the next draft improve"], "followUpSuggestions": ["Concrete, actionable edits"]}}
</verdict>

Use empty lists when you have no questions or suggestions. Higher scores mean better quality."#,
            range = scale.range(),
        )
    }
}

fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        return output;
    }
    let mut cut = max_len;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    match output[..cut].rfind('\n') {
        Some(pos) => &output[..pos],
        None => &output[..cut],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_prompt_mentions_scale() {
        let prompt = CriticPrompts::build_content_prompt("Buy now!", 2, ScoreScale::Unit);
        assert!(prompt.contains("Buy now!"));
        assert!(prompt.contains("round 2"));
        assert!(prompt.contains("0 to 1"));
        assert!(prompt.contains("<verdict>"));
    }

    #[test]
    fn test_reasoning_prompt_first_round_placeholder() {
        let prompt =
            CriticPrompts::build_reasoning_prompt("42", "step 1", None, 1, ScoreScale::Percent);
        assert!(prompt.contains("(first round)"));
        assert!(prompt.contains("step 1"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo\nwörld";
        let cut = truncate_output(text, 9);
        assert_eq!(cut, "héllo");
        assert_eq!(truncate_output("short", 100), "short");
    }
}
