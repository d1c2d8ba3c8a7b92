//! Deterministic cleanup of extracted text and raw model responses.
//!
//! Two independent passes:
//!
//! - [`clean_extracted_text`] normalises what came out of the text layer or
//!   OCR before chunking, so chunk boundaries and the paragraph detector see
//!   consistent `\n\n` separators.
//! - [`clean_response`] strips presentational markup the model adds despite
//!   the prompt (bold markers, code fences) before parsing.
//!
//! Each rule is a pure `&str -> String` function and is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise extracted document text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF) and form feeds to newlines
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Rejoin words hyphenated across a line break (`photo-\nsynthesis`)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive newlines to a single blank line
/// 6. Trim the whole text
pub fn clean_extracted_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = join_hyphenated_breaks(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Strip markup from a raw model response before parsing.
pub fn clean_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    strip_bold(&s)
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n")
}

// ── Invisible characters ────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Hyphenated line breaks ──────────────────────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Ll})-\n(\p{Ll})").unwrap());

fn join_hyphenated_breaks(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").to_string()
}

// ── Whitespace ──────────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Response markup ─────────────────────────────────────────────────────────

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*```[A-Za-z]*\s*$").unwrap());

/// Remove fence lines anywhere in the response, keeping their contents.
fn strip_code_fences(input: &str) -> String {
    RE_CODE_FENCE.replace_all(input, "").to_string()
}

fn strip_bold(input: &str) -> String {
    input.replace("**", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc\u{000C}d"), "a\nb\nc\nd");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "cell\u{200B}ular\u{FEFF} res\u{00AD}piration";
        assert_eq!(remove_invisible_chars(input), "cellular respiration");
    }

    #[test]
    fn test_join_hyphenated_breaks() {
        assert_eq!(join_hyphenated_breaks("photo-\nsynthesis"), "photosynthesis");
        // Proper nouns and list dashes are left alone.
        assert_eq!(join_hyphenated_breaks("Franco-\nPrussian"), "Franco-\nPrussian");
        assert_eq!(join_hyphenated_breaks("- item\n- item"), "- item\n- item");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_extracted_text_full_pipeline() {
        let input = "\u{FEFF}  Title   \r\n\r\n\r\n\r\nThe mito-\nchondria is   \nthe powerhouse.\u{000C}Page 2  ";
        let result = clean_extracted_text(input);
        assert_eq!(
            result,
            "Title\n\nThe mitochondria is\nthe powerhouse.\nPage 2"
        );
    }

    #[test]
    fn test_clean_extracted_text_is_idempotent() {
        let once = clean_extracted_text("a  \n\n\n\nb\r\nc");
        assert_eq!(clean_extracted_text(&once), once);
    }

    #[test]
    fn test_strip_code_fences() {
        let input = "```json\n[{\"question\": \"Q\"}]\n```";
        assert_eq!(strip_code_fences(input).trim(), "[{\"question\": \"Q\"}]");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn test_clean_response() {
        let input = "**Question 1:** What is H2O?\r\n**A)** Water";
        assert_eq!(clean_response(input), "Question 1: What is H2O?\nA) Water");
    }
}
