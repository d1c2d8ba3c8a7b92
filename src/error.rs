//! Error types for the pdf2quiz library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`QuizError`] — **Fatal**: the request cannot produce a quiz at all
//!   (document unreadable, invalid chunk configuration, no chunk yielded a
//!   single question, provider not configured). Returned as
//!   `Err(QuizError)` from the top-level `generate_quiz*` functions.
//!
//! * [`ChunkError`] — **Non-fatal**: a single chunk's LLM call failed, timed
//!   out, or came back in a shape the parser could not read. The chunk simply
//!   contributes zero questions and the error is kept in its
//!   [`crate::output::ChunkReport`].
//!
//! Callers must treat "fewer questions than requested" as success.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2quiz library.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF, an image, nor plain text.
    #[error("Unsupported document '{filename}': {detail}")]
    UnsupportedDocument { filename: String, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// No extraction strategy produced any text.
    #[error("Document '{filename}' is unreadable: no text could be extracted.\n{detail}")]
    ExtractionFailed { filename: String, detail: String },

    /// Chunk size / overlap combination cannot terminate.
    #[error("Invalid chunk configuration: overlap ({overlap}) must be smaller than max chunk size ({max_chunk_size})")]
    InvalidChunkConfig {
        max_chunk_size: usize,
        overlap: usize,
    },

    /// Every chunk contributed zero questions.
    #[error("No questions could be generated from {chunks} chunk(s).\nFirst error: {first_error}")]
    NoQuestionsGenerated {
        chunks: usize,
        first_error: String,
        /// Raw model output of the first chunk that parsed to nothing.
        raw_output: Option<String>,
    },

    /// The generation request itself is malformed (e.g. zero questions).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// Stored in [`crate::output::ChunkReport`]. The request continues unless
/// ALL chunks come back empty.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// LLM call failed after retries.
    #[error("Chunk {chunk}: LLM call failed after {attempts} attempt(s): {detail}")]
    LlmFailed {
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    /// LLM call exceeded the per-call timeout.
    #[error("Chunk {chunk}: LLM call timed out after {secs}s")]
    Timeout { chunk: usize, secs: u64 },

    /// The response matched neither the JSON-list nor the labeled-block shape.
    #[error("Chunk {chunk}: response could not be parsed: {reason}")]
    Unparsable { chunk: usize, reason: String },

    /// The response parsed, but every record was invalid or the list was empty.
    #[error("Chunk {chunk}: response contained no valid questions ({dropped} dropped)")]
    Empty { chunk: usize, dropped: usize },
}

/// Failure of a single LLM invocation, as reported by an
/// [`crate::pipeline::llm::LlmClient`].
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct LlmCallError {
    pub detail: String,
    /// Number of attempts made before giving up (≥ 1).
    pub attempts: u32,
}

impl LlmCallError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            attempts: 1,
        }
    }
}

/// Failure reported by a [`crate::pipeline::render::PdfBackend`].
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.")]
    PdfiumBindingFailed(String),

    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    #[error("Wrong password for PDF")]
    WrongPassword,

    #[error("PDF is corrupt: {0}")]
    CorruptPdf(String),

    #[error("Page {page}: {detail}")]
    PageFailed { page: usize, detail: String },
}

/// Failure reported by a [`crate::pipeline::ocr::OcrEngine`].
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_questions_display() {
        let e = QuizError::NoQuestionsGenerated {
            chunks: 3,
            first_error: "Chunk 1: response could not be parsed".into(),
            raw_output: Some("garbage".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 chunk(s)"), "got: {msg}");
        assert!(msg.contains("Chunk 1"), "got: {msg}");
    }

    #[test]
    fn chunk_config_display() {
        let e = QuizError::InvalidChunkConfig {
            max_chunk_size: 100,
            overlap: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("overlap (100)"));
        assert!(msg.contains("max chunk size (100)"));
    }

    #[test]
    fn chunk_timeout_display() {
        let e = ChunkError::Timeout { chunk: 2, secs: 45 };
        assert!(e.to_string().contains("Chunk 2"));
        assert!(e.to_string().contains("45s"));
    }

    #[test]
    fn chunk_error_serialises() {
        let e = ChunkError::Empty {
            chunk: 1,
            dropped: 4,
        };
        let json = serde_json::to_string(&e).expect("serialise");
        let back: ChunkError = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, e);
    }

    #[test]
    fn extraction_failed_mentions_filename() {
        let e = QuizError::ExtractionFailed {
            filename: "scan.pdf".into(),
            detail: "native: 0 chars".into(),
        };
        assert!(e.to_string().contains("scan.pdf"));
        assert!(e.to_string().contains("unreadable"));
    }
}
