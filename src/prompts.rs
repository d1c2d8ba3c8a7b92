//! Prompt templates for question generation and topic discovery.
//!
//! Templates use `{name}` placeholders that are filled from a
//! [`PromptVars`] map by [`render`]. Only known variable names are
//! substituted, so the literal braces in the JSON example survive untouched.
//!
//! Variables for MCQ prompts: `context`, `num_questions`, `difficulty`,
//! `topic_instruction` (empty string when no topic filter is active).

use crate::config::ResponseFormat;
use std::collections::BTreeMap;

/// System message shared by every question-generation call.
pub const MCQ_SYSTEM_PROMPT: &str = "You are a strict, instruction-following assistant that writes \
accurate multiple-choice questions from study material. You never invent facts that are not \
supported by the supplied text.";

/// Asks for a JSON array of question objects.
pub const MCQ_JSON_TEMPLATE: &str = r#"Based on the following text, generate exactly {num_questions} multiple-choice questions of {difficulty} difficulty.
{topic_instruction}
---TEXT BEGINS---
{context}
---TEXT ENDS---

Return ONLY a JSON array. Each element must have exactly these keys:
- "question": the question text
- "options": an array of exactly 4 distinct answer strings
- "answer": the correct option, copied exactly from "options"
- "explanation": one sentence explaining why the answer is correct

Example:
[
  {
    "question": "What is the capital of France?",
    "options": ["London", "Berlin", "Paris", "Madrid"],
    "answer": "Paris",
    "explanation": "Paris is the official capital city of France."
  }
]"#;

/// Asks for plain-text labeled blocks.
pub const MCQ_LABELED_TEMPLATE: &str = r#"Based on the following text, generate exactly {num_questions} multiple-choice questions of {difficulty} difficulty.
{topic_instruction}
---TEXT BEGINS---
{context}
---TEXT ENDS---

You MUST follow this format for EACH question. Do not deviate. Add a brief, one-sentence explanation for why the answer is correct.

---START OF EXAMPLE---
Question: What is the capital of France?
A) London
B) Berlin
C) Paris
D) Madrid
Correct Answer: C
Explanation: Paris is the official capital city of France, located in the north-central part of the country.
---END OF EXAMPLE---

Now, generate the questions."#;

/// Topic pre-pass: comma-separated labels only.
pub const TOPIC_TEMPLATE: &str = r#"Read the following document excerpt and list between 5 and {max_topics} concise topic labels (1-4 words each) that describe what it covers.

---TEXT BEGINS---
{context}
---TEXT ENDS---

Return ONLY the labels as a single comma-separated list, with no numbering and no other text."#;

pub const TOPIC_SYSTEM_PROMPT: &str =
    "You are a precise assistant that summarises documents into short topic labels.";

/// Named template variables.
pub type PromptVars = BTreeMap<&'static str, String>;

/// A fully rendered prompt: one system message and one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Substitute every `{key}` in `template` that has an entry in `vars`.
///
/// Single pass: placeholders that appear inside substituted values (a
/// document that literally contains `{difficulty}`) are left alone.
pub fn render(template: &str, vars: &PromptVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after
            .find('}')
            .and_then(|close| vars.get(&after[..close]).map(|v| (close, v)))
        {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Instruction restricting generation to `topics`, worded for `format`.
pub fn topic_instruction(topics: &[String], format: ResponseFormat) -> String {
    if topics.is_empty() {
        return String::new();
    }
    let empty = match format {
        ResponseFormat::Json => "an empty JSON array []",
        ResponseFormat::Labeled => "no questions at all",
    };
    format!(
        "\nEvery question MUST relate to at least one of these topics: {}.\n\
         If the text below is not relevant to any of them, return {} instead of inventing questions.\n",
        topics.join(", "),
        empty
    )
}

/// Variables for one chunk's question-generation call.
pub fn mcq_vars(
    context: &str,
    num_questions: usize,
    difficulty: &str,
    topics: &[String],
    format: ResponseFormat,
) -> PromptVars {
    let mut vars = PromptVars::new();
    vars.insert("context", context.to_string());
    vars.insert("num_questions", num_questions.to_string());
    vars.insert("difficulty", difficulty.trim().to_string());
    vars.insert("topic_instruction", topic_instruction(topics, format));
    vars
}

/// Build the question-generation prompt for `format`.
pub fn mcq_prompt(vars: &PromptVars, format: ResponseFormat) -> Prompt {
    let template = match format {
        ResponseFormat::Json => MCQ_JSON_TEMPLATE,
        ResponseFormat::Labeled => MCQ_LABELED_TEMPLATE,
    };
    Prompt {
        system: MCQ_SYSTEM_PROMPT.to_string(),
        user: render(template, vars),
    }
}

/// Build the topic pre-pass prompt.
pub fn topic_prompt(preview: &str, max_topics: usize) -> Prompt {
    let mut vars = PromptVars::new();
    vars.insert("context", preview.to_string());
    vars.insert("max_topics", max_topics.max(5).to_string());
    Prompt {
        system: TOPIC_SYSTEM_PROMPT.to_string(),
        user: render(TOPIC_TEMPLATE, &vars),
    }
}
