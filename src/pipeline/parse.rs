//! Turn a raw model response into validated questions.
//!
//! Two response shapes are understood:
//!
//! - **JSON list**: the slice from the first `[` to the last `]` is decoded as
//!   an array of question objects. Prose or code fences around it are ignored.
//! - **Labeled blocks**: `Question:` / `A)`..`D)` / `Correct Answer:` /
//!   `Explanation:` lines, read by a small line state machine.
//!
//! Every candidate goes through [`Mcq::build`]; records that fail validation
//! are counted as dropped, never repaired. A response in which no record can
//! even be located is [`ParseOutcome::Unparsable`], which is distinct from a
//! response that was read fine but held zero valid questions.

use crate::config::ResponseFormat;
use crate::output::{Mcq, McqRejection};
use crate::pipeline::clean::clean_response;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

/// Result of parsing one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Records were located. `questions` may be empty if all were invalid.
    Parsed { questions: Vec<Mcq>, dropped: usize },
    /// No record could be located at all.
    Unparsable { reason: String },
}

impl ParseOutcome {
    /// Valid questions, or an empty list.
    pub fn questions(&self) -> &[Mcq] {
        match self {
            ParseOutcome::Parsed { questions, .. } => questions,
            ParseOutcome::Unparsable { .. } => &[],
        }
    }

    pub fn is_unparsable(&self) -> bool {
        matches!(self, ParseOutcome::Unparsable { .. })
    }
}

/// Parse `raw`, trying the shape the prompt asked for first and the other
/// shape if that one yields no valid question.
///
/// When neither shape yields a question, a `Parsed` outcome (with its
/// dropped count) is preferred over `Unparsable`, the preferred shape first.
pub fn parse_response(raw: &str, preferred: ResponseFormat) -> ParseOutcome {
    let cleaned = clean_response(raw);

    let (first, second): (fn(&str) -> ParseOutcome, fn(&str) -> ParseOutcome) = match preferred {
        ResponseFormat::Json => (parse_json_list, parse_labeled_blocks),
        ResponseFormat::Labeled => (parse_labeled_blocks, parse_json_list),
    };

    let primary = first(&cleaned);
    if !primary.questions().is_empty() {
        return primary;
    }

    let fallback = second(&cleaned);
    if !fallback.questions().is_empty() {
        debug!("Response parsed with the fallback shape");
        return fallback;
    }

    match (primary, fallback) {
        (ParseOutcome::Unparsable { reason }, ParseOutcome::Unparsable { reason: other }) => {
            ParseOutcome::Unparsable {
                reason: format!("{reason}; {other}"),
            }
        }
        (ParseOutcome::Unparsable { .. }, parsed) => parsed,
        (parsed, _) => parsed,
    }
}

// ── JSON list ────────────────────────────────────────────────────────────────

/// Decode the first-`[`-to-last-`]` slice as a JSON array of question objects.
pub fn parse_json_list(text: &str) -> ParseOutcome {
    let (Some(open), Some(close)) = (text.find('['), text.rfind(']')) else {
        return ParseOutcome::Unparsable {
            reason: "no JSON array found".to_string(),
        };
    };
    if close < open {
        return ParseOutcome::Unparsable {
            reason: "no JSON array found".to_string(),
        };
    }

    let items: Vec<Value> = match serde_json::from_str(&text[open..=close]) {
        Ok(items) => items,
        Err(e) => {
            return ParseOutcome::Unparsable {
                reason: format!("invalid JSON array: {e}"),
            }
        }
    };

    let total = items.len();
    let mut questions = Vec::with_capacity(total);
    for (i, item) in items.iter().enumerate() {
        match mcq_from_value(item) {
            Ok(q) => questions.push(q),
            Err(e) => debug!("Dropping JSON record {}: {}", i + 1, e),
        }
    }

    finish(questions, total)
}

/// Build a question from one JSON object, accepting the key spellings
/// models commonly use.
fn mcq_from_value(value: &Value) -> Result<Mcq, McqRejection> {
    let obj = value
        .as_object()
        .ok_or(McqRejection::MissingField("question"))?;

    let field = |names: &[&str]| -> Option<String> {
        names
            .iter()
            .find_map(|n| obj.get(*n))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    };

    let question = field(&["question", "prompt"]).ok_or(McqRejection::MissingField("question"))?;
    let answer = field(&["answer", "correct_answer", "correct"])
        .ok_or(McqRejection::MissingField("answer"))?;
    let explanation = field(&["explanation", "rationale"])
        .ok_or(McqRejection::MissingField("explanation"))?;

    let options = match obj.get("options").or_else(|| obj.get("choices")) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>(),
        // {"A": "...", "B": "...", ...}
        Some(Value::Object(map)) => map
            .values()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_default())
            .collect(),
        _ => return Err(McqRejection::MissingField("options")),
    };

    Mcq::build(&question, &strip_option_labels(options), &answer, &explanation)
}

static RE_OPTION_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\(?[A-Da-d][\).:]\s+").unwrap());

/// Drop `A) ` style prefixes when every option carries one.
fn strip_option_labels(options: Vec<String>) -> Vec<String> {
    if options.len() == 4 && options.iter().all(|o| RE_OPTION_LABEL.is_match(o)) {
        options
            .iter()
            .map(|o| RE_OPTION_LABEL.replace(o, "").to_string())
            .collect()
    } else {
        options
    }
}

// ── Labeled blocks ───────────────────────────────────────────────────────────

// Tolerates a markdown heading or list number in front: `### Question 1:`,
// `2. Question:`.
static RE_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:#+\s*|\d+[.)]\s*)?(?:question|q)\s*\d*\s*[:.)]\s*(.*)$").unwrap()
});

// A-H so a block with a fifth option is caught and rejected instead of the
// extra line being glued onto option D.
static RE_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(?([A-H])[\).:]\s*(.+)$").unwrap());

static RE_ANSWER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:correct\s+)?answer\s*[:\-]?\s*(.+)$").unwrap());

static RE_EXPLANATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^explanation\s*[:\-]?\s*(.*)$").unwrap());

#[derive(Debug, Default)]
struct Block {
    question: String,
    options: Vec<String>,
    answer: Option<String>,
    explanation: Vec<String>,
    in_explanation: bool,
}

impl Block {
    fn new(question: &str) -> Self {
        Self {
            question: question.trim().to_string(),
            ..Default::default()
        }
    }

    fn feed(&mut self, line: &str) {
        if self.in_explanation {
            self.explanation.push(line.to_string());
        } else if let Some(caps) = RE_EXPLANATION.captures(line) {
            self.in_explanation = true;
            self.explanation.push(caps[1].to_string());
        } else if let Some(caps) = RE_ANSWER
            .captures(line)
            .filter(|_| self.options.len() >= 4)
        {
            // Before the options, "Answer the following..." is question text.
            self.answer = Some(caps[1].to_string());
        } else if self.answer.is_some() {
            debug!("Ignoring stray line after answer: {}", line);
        } else if let Some(caps) = RE_OPTION.captures(line) {
            self.options.push(caps[2].to_string());
        } else if let Some(last) = self.options.last_mut() {
            last.push(' ');
            last.push_str(line);
        } else {
            if !self.question.is_empty() {
                self.question.push(' ');
            }
            self.question.push_str(line);
        }
    }

    fn build(self) -> Result<Mcq, McqRejection> {
        let answer = self.answer.ok_or(McqRejection::MissingField("answer"))?;
        let explanation = self
            .explanation
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Mcq::build(&self.question, &self.options, &answer, &explanation)
    }
}

/// Read `Question:` blocks with a line state machine.
///
/// A block runs from its `Question` line to the next one (or the end of the
/// text), so one block can never swallow the next.
pub fn parse_labeled_blocks(text: &str) -> ParseOutcome {
    let mut blocks: Vec<Block> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = RE_QUESTION.captures(line) {
            blocks.push(Block::new(&caps[1]));
        } else if let Some(current) = blocks.last_mut() {
            current.feed(line);
        }
    }

    if blocks.is_empty() {
        return ParseOutcome::Unparsable {
            reason: "no 'Question:' blocks found".to_string(),
        };
    }

    let total = blocks.len();
    let mut questions = Vec::with_capacity(total);
    for (i, block) in blocks.into_iter().enumerate() {
        match block.build() {
            Ok(q) => questions.push(q),
            Err(e) => debug!("Dropping labeled block {}: {}", i + 1, e),
        }
    }

    finish(questions, total)
}

fn finish(questions: Vec<Mcq>, total: usize) -> ParseOutcome {
    let dropped = total - questions.len();
    if dropped > 0 {
        info!("Recovered {} of {} questions ({} dropped)", questions.len(), total, dropped);
    }
    ParseOutcome::Parsed { questions, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_BLOCKS: &str = "\
Here are your questions.

Question: What is the capital of France?
A) London
B) Berlin
C) Paris
D) Madrid
Correct Answer: C
Explanation: Paris is the capital of France.

Question: Which gas do plants absorb?
A) Oxygen
B) Carbon dioxide
C) Nitrogen
D) Helium
Correct Answer: B
Explanation: Plants take in CO2 for photosynthesis.

Question: What is 2 + 2?
A) 3
B) 4
C) 5
D) 22
Correct Answer: B
Explanation: Two plus two equals four.
";

    fn parsed(outcome: ParseOutcome) -> (Vec<Mcq>, usize) {
        match outcome {
            ParseOutcome::Parsed { questions, dropped } => (questions, dropped),
            ParseOutcome::Unparsable { reason } => panic!("unexpectedly unparsable: {reason}"),
        }
    }

    #[test]
    fn labeled_blocks_parse_with_answer_text() {
        let (qs, dropped) = parsed(parse_labeled_blocks(THREE_BLOCKS));
        assert_eq!(qs.len(), 3);
        assert_eq!(dropped, 0);
        assert_eq!(qs[0].answer, "Paris");
        assert_eq!(qs[0].answer_letter(), 'C');
        assert_eq!(qs[1].answer, "Carbon dioxide");
        assert_eq!(qs[2].options, ["3", "4", "5", "22"].map(String::from));
    }

    #[test]
    fn explanation_stops_at_next_question() {
        let (qs, _) = parsed(parse_labeled_blocks(THREE_BLOCKS));
        assert_eq!(qs[0].explanation, "Paris is the capital of France.");
        assert!(!qs[0].explanation.contains("Question"));
    }

    #[test]
    fn block_with_three_options_is_dropped() {
        let text = THREE_BLOCKS.replace("D) Helium\n", "");
        let (qs, dropped) = parsed(parse_labeled_blocks(&text));
        assert_eq!(qs.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(qs[1].question, "What is 2 + 2?");
    }

    #[test]
    fn block_with_five_options_is_dropped() {
        let text = THREE_BLOCKS.replace("D) Madrid\n", "D) Madrid\nE) Rome\n");
        let (qs, dropped) = parsed(parse_labeled_blocks(&text));
        assert_eq!((qs.len(), dropped), (2, 1));
    }

    #[test]
    fn answer_and_label_variants_are_tolerated() {
        let text = "\
Question 1: Largest planet?
A. Mars
B. Jupiter
C. Venus
D. Earth
Answer: (B)
Explanation: Jupiter is the largest.
It is a gas giant.

Q2) Smallest prime?
(A) 1
(B) 2
(C) 3
(D) 5
Correct Answer: B) 2
Explanation - 2 is the only even prime.
";
        let (qs, dropped) = parsed(parse_labeled_blocks(text));
        assert_eq!(dropped, 0);
        assert_eq!(qs[0].answer, "Jupiter");
        assert_eq!(qs[0].explanation, "Jupiter is the largest. It is a gas giant.");
        assert_eq!(qs[1].answer, "2");
    }

    #[test]
    fn wrapped_option_lines_are_joined() {
        let text = "Question: Pick one\nA) first part\nof option A\nB) b\nC) c\nD) d\nCorrect Answer: A\nExplanation: e";
        let (qs, _) = parsed(parse_labeled_blocks(text));
        assert_eq!(qs[0].options[0], "first part of option A");
    }

    #[test]
    fn answer_outside_options_is_dropped() {
        let text = "Question: q\nA) a\nB) b\nC) c\nD) d\nCorrect Answer: E\nExplanation: e";
        let (qs, dropped) = parsed(parse_labeled_blocks(text));
        assert!(qs.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn bold_markup_is_removed_before_parsing() {
        let text = THREE_BLOCKS
            .replace("Question:", "**Question:**")
            .replace("Correct Answer:", "**Correct Answer:**");
        let (qs, _) = parsed(parse_response(&text, ResponseFormat::Labeled));
        assert_eq!(qs.len(), 3);
    }

    #[test]
    fn prose_without_blocks_is_unparsable() {
        let outcome = parse_labeled_blocks("I'm sorry, I cannot help with that.");
        assert!(outcome.is_unparsable());
    }

    const JSON_REPLY: &str = r#"Sure! Here you go:
```json
[
  {"question": "What is H2O?", "options": ["Water", "Salt", "Sugar", "Air"], "answer": "Water", "explanation": "H2O is water."},
  {"question": "Boiling point of water at sea level?", "options": ["90 C", "100 C", "110 C", "120 C"], "answer": "B", "explanation": "Water boils at 100 C."},
  {"question": "Bad record", "options": ["only", "three", "options"], "answer": "only", "explanation": "x"}
]
```"#;

    #[test]
    fn json_list_with_fences_and_prose() {
        let (qs, dropped) = parsed(parse_response(JSON_REPLY, ResponseFormat::Json));
        assert_eq!(qs.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(qs[1].answer, "100 C");
    }

    #[test]
    fn json_option_objects_and_labels() {
        let text = r#"[{"question": "Q?", "choices": {"A": "one", "B": "two", "C": "three", "D": "four"}, "correct_answer": "D", "explanation": "four"},
                      {"question": "R?", "options": ["A) red", "B) green", "C) blue", "D) black"], "answer": "C", "explanation": "blue"}]"#;
        let (qs, _) = parsed(parse_json_list(text));
        assert_eq!(qs[0].answer, "four");
        assert_eq!(qs[1].options[0], "red");
        assert_eq!(qs[1].answer, "blue");
    }

    #[test]
    fn empty_json_array_is_parsed_not_unparsable() {
        let (qs, dropped) = parsed(parse_json_list("[]"));
        assert!(qs.is_empty());
        assert_eq!(dropped, 0);
    }

    #[test]
    fn broken_json_is_unparsable() {
        assert!(parse_json_list("[{\"question\": ").is_unparsable());
        assert!(parse_json_list("no brackets here").is_unparsable());
        assert!(parse_json_list("] backwards [").is_unparsable());
    }

    #[test]
    fn falls_back_to_other_shape() {
        let (qs, _) = parsed(parse_response(THREE_BLOCKS, ResponseFormat::Json));
        assert_eq!(qs.len(), 3);
        let (qs, _) = parsed(parse_response(JSON_REPLY, ResponseFormat::Labeled));
        assert_eq!(qs.len(), 2);
    }

    #[test]
    fn both_shapes_failing_reports_both_reasons() {
        match parse_response("nothing useful", ResponseFormat::Json) {
            ParseOutcome::Unparsable { reason } => {
                assert!(reason.contains("JSON"));
                assert!(reason.contains("Question"));
            }
            other => panic!("expected unparsable, got {other:?}"),
        }
    }

    #[test]
    fn stray_bracket_literal_does_not_hide_labeled_blocks() {
        let text = "Question: Which literal is a list?\nA) [1, 2, 3]\nB) 42\nC) \"hi\"\nD) true\nCorrect Answer: A\nExplanation: Square brackets denote a list.";
        assert!(parse_json_list(text).questions().is_empty());

        let (qs, _) = parsed(parse_response(text, ResponseFormat::Json));
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].answer, "[1, 2, 3]");
    }

    #[test]
    fn zero_questions_from_both_shapes_keeps_the_dropped_count() {
        let text = r#"[{"question": "Q?", "options": ["a", "b"], "answer": "a", "explanation": "e"}]"#;
        let (qs, dropped) = parsed(parse_response(text, ResponseFormat::Json));
        assert!(qs.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn heading_and_numbered_question_lines_are_recognised() {
        let text = "\
### Question 1: Largest planet?
A) Mars
B) Jupiter
C) Venus
D) Earth
Correct Answer: B
Explanation: Jupiter is the largest.

2. Question: Smallest prime?
A) 1
B) 2
C) 3
D) 5
Correct Answer: B
Explanation: 2 is the smallest prime.
";
        let (qs, dropped) = parsed(parse_labeled_blocks(text));
        assert_eq!(dropped, 0);
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].question, "Largest planet?");
        assert_eq!(qs[1].question, "Smallest prime?");
    }

    #[test]
    fn answer_word_before_options_stays_in_the_question() {
        let text = "\
Question: Read the passage carefully.
Answer the following: which organelle makes ATP?
A) Nucleus
B) Mitochondrion
C) Ribosome
D) Golgi body
Correct Answer: B
Explanation: Mitochondria produce most of the cell's ATP.
";
        let (qs, dropped) = parsed(parse_labeled_blocks(text));
        assert_eq!(dropped, 0);
        assert_eq!(
            qs[0].question,
            "Read the passage carefully. Answer the following: which organelle makes ATP?"
        );
        assert_eq!(qs[0].answer, "Mitochondrion");
    }
}
