//! # pdf2quiz
//!
//! Generate validated multiple-choice quizzes from PDFs, scanned documents,
//! and plain text using Large Language Models.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (path, URL, or bytes)
//!  │
//!  ├─ 1. Input     resolve local file or download; detect PDF / text / image
//!  ├─ 2. Extract   pdfium text layer, Tesseract OCR for scanned pages
//!  ├─ 3. Clean     line endings, invisible chars, hyphenation, blank runs
//!  ├─ 4. Topics    optional LLM pre-pass producing topic labels
//!  ├─ 5. Chunk     bounded, overlapping, paragraph/sentence-aware windows
//!  ├─ 6. Generate  concurrent per-chunk LLM calls with retry + timeout
//!  ├─ 7. Parse     JSON-list or labeled-block replies → validated MCQs
//!  ├─ 8. Sample    merge, shuffle, truncate to the requested count
//!  └─ 9. Videos    optional YouTube recommendations per topic
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2quiz::{generate_quiz, GenerationConfig, GenerationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GenerationConfig::default();
//!     let request = GenerationRequest::new(10, "Medium").with_topic_discovery(true);
//!     let output = generate_quiz("lecture.pdf", &request, &config).await?;
//!     for q in &output.questions {
//!         println!("{}\n  answer: {}", q.question, q.answer);
//!     }
//!     eprintln!("{} of {} chunks failed", output.stats.failed_chunks, output.stats.chunk_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2quiz` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2quiz = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! - **pdfium** shared library for PDF text and rendering (`PDFIUM_LIB_PATH`
//!   to point at a specific copy).
//! - **tesseract** on `PATH` for the OCR fallback. Without it, scanned PDFs
//!   with no text layer fail extraction.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod quiz;
pub mod recommend;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Difficulty, GenerationConfig, GenerationConfigBuilder, GenerationRequest, ResponseFormat,
};
pub use error::{ChunkError, LlmCallError, QuizError};
pub use output::{ChunkReport, GenerationOutput, GenerationStats, Mcq, McqRejection, QuestionBatch};
pub use pipeline::extract::{ExtractedText, TextSource};
pub use pipeline::input::{Document, MediaType};
pub use pipeline::llm::{FnClient, LlmClient, LlmReply};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use quiz::{
    discover_topics, extract_document, generate_quiz, generate_quiz_from_bytes,
    generate_quiz_from_document, generate_quiz_sync, generate_quiz_to_file,
};
pub use recommend::{VideoRecommendation, VideoSearch, YouTubeSearch};
