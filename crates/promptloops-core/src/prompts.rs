use crate::GenerationRequest;

/// Prompt templates for the generator
pub struct GeneratorPrompts;

impl GeneratorPrompts {
    /// Improvement request for plain content.
    ///
    /// With no feedback at all (the first round) the subject is passed
    /// through untouched so the generator answers the user's request.
    pub fn build_content_prompt(request: &GenerationRequest) -> String {
        if request.critique.is_empty()
            && request.follow_up_suggestions.is_empty()
            && request.feedback.is_empty()
        {
            return request.subject.clone();
        }

        format!(
            r#"You are an expert content editor. Significantly improve the content below: clarity, engagement, logical flow, factual accuracy and persuasiveness. Incorporate the critique, the suggestions and any feedback so the result matches what the reader expects.

## Original Content
{content}

## Critique
{critique}

## Follow-up Suggestions
{suggestions}

## Feedback
{feedback}

Reply with the improved content only."#,
            content = request.subject,
            critique = or_none(&request.critique),
            suggestions = or_none(&request.follow_up_suggestions),
            feedback = or_none(&request.feedback),
        )
    }

    /// Step-by-step reasoning request that builds on the running trace
    pub fn build_reasoning_prompt(request: &GenerationRequest) -> String {
        let reasoning = request.reasoning.as_deref().unwrap_or_default();
        format!(
            r#"Solve the task below by reasoning step by step. Continue from the reasoning so far: keep the steps that hold, revise the ones the critique rejects, and add what is missing.

## Task
{task}

## Reasoning So Far
{reasoning}

## Critique of the Reasoning
{critique}

## Follow-up Suggestions
{suggestions}

## Feedback and Open Questions
{feedback}

## Required Response Format
<reasoning>
The new or revised reasoning steps
</reasoning>
<answer>
The final answer supported by the reasoning
</answer>"#,
            task = request.subject,
            reasoning = or_none(reasoning),
            critique = or_none(&request.critique),
            suggestions = or_none(&request.follow_up_suggestions),
            feedback = or_none(&request.feedback),
        )
    }
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(none)"
    } else {
        text
    }
}
