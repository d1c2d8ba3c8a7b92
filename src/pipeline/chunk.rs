//! Split cleaned text into bounded, overlapping chunks.
//!
//! Sizes are measured in characters, not bytes, so multi-byte scripts get
//! the same window as ASCII. Each window is at most `max_chunk_size`
//! characters. Within the last `lookback` characters of the window the
//! chunker prefers to break after a paragraph (`\n\n`), then after a sentence
//! end (`.`, `!`, `?` followed by whitespace), and hard-cuts otherwise.
//!
//! The next chunk starts `overlap` characters before the previous one ended.
//! Example with max 10, overlap 3 and no boundaries:
//!
//! ```text
//! text:    abcdefghijklmnopqrstu
//! chunk 0: abcdefghij            (0..10)
//! chunk 1:        hijklmnopq     (7..17)
//! chunk 2:               opqrstu (14..21)
//! ```
//!
//! A break is never placed at or before `start + overlap`, so each step
//! advances by at least one character and the loop terminates.

use crate::error::QuizError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default lookback window for boundary search.
pub const DEFAULT_LOOKBACK: usize = 200;

/// One segment of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    /// Character offset of the first character in the full text.
    pub start: usize,
    pub text: String,
}

impl TextChunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Character offset one past the last character.
    pub fn end(&self) -> usize {
        self.start + self.char_len()
    }
}

/// Greedy boundary-aware splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
    lookback: usize,
}

impl Chunker {
    /// Fails with [`QuizError::InvalidChunkConfig`] when `max_chunk_size` is
    /// zero or `overlap >= max_chunk_size`.
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self, QuizError> {
        if max_chunk_size == 0 || overlap >= max_chunk_size {
            return Err(QuizError::InvalidChunkConfig {
                max_chunk_size,
                overlap,
            });
        }
        Ok(Self {
            max_chunk_size,
            overlap,
            lookback: DEFAULT_LOOKBACK,
        })
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut chunks = Vec::new();
        if n == 0 {
            return chunks;
        }

        let mut start = 0usize;
        loop {
            let hard_end = (start + self.max_chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                self.find_break(&chars, start, hard_end)
            };

            chunks.push(TextChunk {
                index: chunks.len(),
                start,
                text: chars[start..end].iter().collect(),
            });

            if end == n {
                break;
            }
            start = end - self.overlap;
        }

        debug!(
            "Split {} chars into {} chunks (max {}, overlap {})",
            n,
            chunks.len(),
            self.max_chunk_size,
            self.overlap
        );
        chunks
    }

    /// Exclusive end of the chunk starting at `start`. Always in
    /// `start + overlap + 1 ..= hard_end`.
    fn find_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let lo = hard_end
            .saturating_sub(self.lookback)
            .max(start + self.overlap + 1);
        if lo > hard_end {
            return hard_end;
        }

        // Paragraph: break after "\n\n".
        for end in (lo..=hard_end).rev() {
            if end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n' {
                return end;
            }
        }

        // Sentence: break after the punctuation, leave the whitespace for the
        // next chunk.
        for end in (lo..=hard_end).rev() {
            if end >= 1
                && end < chars.len()
                && matches!(chars[end - 1], '.' | '!' | '?')
                && chars[end].is_whitespace()
            {
                return end;
            }
        }

        hard_end
    }
}

/// Split `text` with the default lookback.
pub fn split(text: &str, max_chunk_size: usize, overlap: usize) -> Result<Vec<TextChunk>, QuizError> {
    Ok(Chunker::new(max_chunk_size, overlap)?.split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_document_gives_three_chunks() {
        let text = "x".repeat(9000);
        let chunks = split(&text, 4000, 200).expect("split");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[1].start, 3800);
        assert_eq!(chunks[2].start, 7600);
        assert_eq!(chunks[2].end(), 9000);
        assert!(chunks.iter().all(|c| c.char_len() <= 4000));
    }

    #[test]
    fn test_empty_text_gives_no_chunks() {
        assert!(split("", 4000, 200).expect("split").is_empty());
    }

    #[test]
    fn test_short_text_gives_one_chunk() {
        let chunks = split("just a few words", 100, 10).expect("split");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a few words");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            split("abc", 5, 5),
            Err(QuizError::InvalidChunkConfig { max_chunk_size: 5, overlap: 5 })
        ));
        assert!(split("abc", 0, 0).is_err());
        assert!(split("abc", 5, 9).is_err());
    }

    #[test]
    fn test_adjacent_chunks_overlap_exactly() {
        let text: String = ('a'..='z').cycle().take(500).collect();
        let chunks = split(&text, 60, 15).expect("split");
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end() - pair[1].start, 15);
            let tail: String = pair[0].text.chars().skip(pair[0].char_len() - 15).collect();
            let head: String = pair[1].text.chars().take(15).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_chunks_cover_the_text() {
        let text = "One sentence here. Another one follows!\n\nA new paragraph? Yes. ".repeat(40);
        let chunks = split(&text, 300, 50).expect("split");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().map(|c| c.end()), Some(text.chars().count()));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.char_len() <= 300);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let para = format!("{}.\n\n", "a".repeat(79));
        let text = format!("{para}{}", "b. ".repeat(40));
        let chunks = Chunker::new(100, 10)
            .expect("chunker")
            .with_lookback(40)
            .split(&text);
        assert!(chunks[0].text.ends_with(".\n\n"), "got {:?}", chunks[0].text);
        assert_eq!(chunks[0].char_len(), 82);
    }

    #[test]
    fn test_falls_back_to_sentence_break() {
        let text = format!("{}. {}", "a".repeat(89), "b".repeat(100));
        let chunks = Chunker::new(100, 10)
            .expect("chunker")
            .with_lookback(30)
            .split(&text);
        assert!(chunks[0].text.ends_with('.'));
        assert_eq!(chunks[0].char_len(), 90);
        assert!(chunks[1].text.starts_with(&"a".repeat(9)));
    }

    #[test]
    fn test_break_never_at_or_before_overlap() {
        // Sentence end at offset 5 lies inside the overlap zone of 10.
        let text = format!("abcd. {}", "z".repeat(200));
        let chunks = Chunker::new(20, 10).expect("chunker").split(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn test_multibyte_characters_are_counted_once() {
        let text = "é".repeat(250);
        let chunks = split(&text, 100, 20).expect("split");
        assert_eq!(chunks[0].char_len(), 100);
        assert_eq!(chunks[1].start, 80);
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "Cells divide. Mitosis has phases!\n\nProphase comes first. ".repeat(100);
        let a = split(&text, 500, 100).expect("split");
        let b = split(&text, 500, 100).expect("split");
        assert_eq!(a, b);
    }
}
