//! Result types: validated questions, per-chunk reports, and run statistics.
//!
//! [`Mcq`] is the only place the question invariants live. Every path that
//! produces a question (JSON-list parsing, labeled-block parsing, decoding a
//! persisted quiz) goes through [`Mcq::build`], so an invalid record is
//! dropped rather than repaired.

use crate::error::ChunkError;
use crate::pipeline::extract::TextSource;
use crate::recommend::VideoRecommendation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a candidate record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McqRejection {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("question text is empty")]
    EmptyQuestion,

    #[error("expected exactly 4 options, got {0}")]
    WrongOptionCount(usize),

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("answer '{0}' does not match any option")]
    AnswerNotAnOption(String),

    #[error("explanation is empty")]
    EmptyExplanation,
}

/// A validated multiple-choice question.
///
/// Invariants: non-empty question, exactly four non-empty options in their
/// original order, `answer` equal to one of the options, non-empty
/// explanation. Deserialisation re-validates, so a persisted quiz that was
/// tampered with fails to decode instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "McqRecord")]
pub struct Mcq {
    pub question: String,
    pub options: [String; 4],
    /// Always the full option text, never a letter.
    pub answer: String,
    pub explanation: String,
}

impl Mcq {
    /// Validate and construct a question.
    ///
    /// All fields are trimmed. `answer` may be the option text or a single
    /// letter `A`–`D` (optionally followed by the option text, as in
    /// `"C) Paris"`); the stored answer is always the option text.
    pub fn build(
        question: &str,
        options: &[String],
        answer: &str,
        explanation: &str,
    ) -> Result<Self, McqRejection> {
        let question = question.trim();
        if question.is_empty() {
            return Err(McqRejection::EmptyQuestion);
        }
        if options.len() != 4 {
            return Err(McqRejection::WrongOptionCount(options.len()));
        }
        let mut opts: [String; 4] = Default::default();
        for (i, raw) in options.iter().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(McqRejection::EmptyOption(i));
            }
            opts[i] = trimmed.to_string();
        }
        let explanation = explanation.trim();
        if explanation.is_empty() {
            return Err(McqRejection::EmptyExplanation);
        }

        let answer = resolve_answer(answer.trim(), &opts)
            .ok_or_else(|| McqRejection::AnswerNotAnOption(answer.trim().to_string()))?;

        Ok(Self {
            question: question.to_string(),
            options: opts,
            answer,
            explanation: explanation.to_string(),
        })
    }

    /// Zero-based index of the correct option.
    pub fn answer_index(&self) -> usize {
        self.options
            .iter()
            .position(|o| *o == self.answer)
            .unwrap_or_default()
    }

    /// Letter (`A`–`D`) of the correct option.
    pub fn answer_letter(&self) -> char {
        (b'A' + self.answer_index() as u8) as char
    }
}

/// Map an answer onto option text: exact text first, then letter forms.
fn resolve_answer(answer: &str, options: &[String; 4]) -> Option<String> {
    if let Some(exact) = options.iter().find(|o| o.as_str() == answer) {
        return Some(exact.clone());
    }

    let s = answer.trim_start_matches('(');
    let mut chars = s.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !('A'..='D').contains(&letter) {
        return None;
    }
    let idx = (letter as u8 - b'A') as usize;

    // "C", "(C)", "C." or "C) Paris"
    let rest = chars.as_str().trim_start_matches([')', '.', ':']).trim();
    if rest.is_empty() || rest == options[idx] {
        return Some(options[idx].clone());
    }
    None
}

/// Loose shape used only to route deserialised data through [`Mcq::build`].
#[derive(Debug, Deserialize)]
pub(crate) struct McqRecord {
    pub(crate) question: Option<String>,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) answer: Option<String>,
    pub(crate) explanation: Option<String>,
}

impl TryFrom<McqRecord> for Mcq {
    type Error = McqRejection;

    fn try_from(r: McqRecord) -> Result<Self, Self::Error> {
        let question = r.question.ok_or(McqRejection::MissingField("question"))?;
        let options = r.options.ok_or(McqRejection::MissingField("options"))?;
        let answer = r.answer.ok_or(McqRejection::MissingField("answer"))?;
        let explanation = r
            .explanation
            .ok_or(McqRejection::MissingField("explanation"))?;
        Mcq::build(&question, &options, &answer, &explanation)
    }
}

/// An ordered list of validated questions.
///
/// Serialises as a plain JSON array. [`QuestionBatch::from_json`] is the only
/// supported way to load a stored quiz: it is strict and never falls back to
/// any looser interpretation of the data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionBatch {
    questions: Vec<Mcq>,
}

impl QuestionBatch {
    pub fn new(questions: Vec<Mcq>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mcq> {
        self.questions.iter()
    }

    pub fn as_slice(&self) -> &[Mcq] {
        &self.questions
    }

    pub fn into_vec(self) -> Vec<Mcq> {
        self.questions
    }

    /// Strictly decode a persisted quiz.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl IntoIterator for QuestionBatch {
    type Item = Mcq;
    type IntoIter = std::vec::IntoIter<Mcq>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.into_iter()
    }
}

impl<'a> IntoIterator for &'a QuestionBatch {
    type Item = &'a Mcq;
    type IntoIter = std::slice::Iter<'a, Mcq>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}

impl From<Vec<Mcq>> for QuestionBatch {
    fn from(questions: Vec<Mcq>) -> Self {
        Self { questions }
    }
}

/// Outcome of one chunk's LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    /// 0-based chunk index.
    pub chunk_index: usize,
    /// Questions asked of the model for this chunk.
    pub requested: usize,
    /// Valid questions recovered.
    pub parsed: usize,
    /// Records recognised but rejected by validation.
    pub dropped: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub error: Option<ChunkError>,
    /// Raw model output, kept only when the chunk yielded no questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

/// Statistics for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub extracted_chars: usize,
    pub chunk_count: usize,
    pub questions_per_chunk: usize,
    /// Valid questions across all chunks before sampling.
    pub pool_size: usize,
    pub returned: usize,
    pub failed_chunks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a caller gets back from a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub questions: QuestionBatch,
    /// Topic labels discovered or supplied for this run.
    pub topics: Vec<String>,
    pub recommendations: Vec<VideoRecommendation>,
    pub chunks: Vec<ChunkReport>,
    pub source: TextSource,
    pub stats: GenerationStats,
}
