//! Quiz generation entry points.
//!
//! These functions wire the pipeline stages together:
//!
//! ```text
//! input ──▶ extract ──▶ clean ──▶ [topics] ──▶ chunk ──▶ generate ──▶ [recommend]
//! ```
//!
//! Everything a run needs comes from the [`GenerationConfig`] passed in;
//! nothing is looked up globally except the provider/API-key environment
//! variables the LLM and video-search resolution chains document.

use crate::config::{GenerationConfig, GenerationRequest};
use crate::error::QuizError;
use crate::output::{GenerationOutput, GenerationStats};
use crate::pipeline::chunk::Chunker;
use crate::pipeline::extract::{ExtractedText, TextExtractor};
use crate::pipeline::generate::QuestionGenerator;
use crate::pipeline::input::{self, Document};
use crate::pipeline::llm::{resolve_client, LlmClient};
use crate::pipeline::topics::{extract_topics, preview_words};
use crate::recommend::{recommend_for_topics, VideoRecommendation, VideoSearch, YouTubeSearch};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Generate a quiz from a local file path or HTTP(S) URL.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(GenerationOutput)` whenever at least one valid question was produced,
/// even if some chunks failed (check `output.stats.failed_chunks`) or fewer
/// questions than requested came back.
///
/// # Errors
/// Returns `Err(QuizError)` only for fatal errors:
/// - File not found / download failed / unsupported document
/// - No text could be extracted
/// - Invalid request or configuration, or no LLM provider
/// - Every chunk came back without a valid question
pub async fn generate_quiz(
    input_str: impl AsRef<str>,
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QuizError> {
    let input_str = input_str.as_ref();
    info!("Starting quiz generation: {}", input_str);
    let doc = input::resolve_input(input_str, config.download_timeout_secs).await?;
    generate_quiz_from_document(doc, request, config).await
}

/// Generate a quiz from an in-memory upload.
///
/// The media type is detected from the bytes and `filename`.
///
/// # Example
/// ```rust,no_run
/// use pdf2quiz::{generate_quiz_from_bytes, GenerationConfig, GenerationRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("lecture.pdf")?;
/// let request = GenerationRequest::new(10, "Hard");
/// let output = generate_quiz_from_bytes(bytes, "lecture.pdf", &request, &GenerationConfig::default()).await?;
/// for q in &output.questions {
///     println!("{} -> {}", q.question, q.answer);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate_quiz_from_bytes(
    bytes: Vec<u8>,
    filename: impl Into<String>,
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QuizError> {
    let doc = Document::new(bytes, filename)?;
    generate_quiz_from_document(doc, request, config).await
}

/// Generate a quiz from an already-resolved [`Document`].
pub async fn generate_quiz_from_document(
    doc: Document,
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QuizError> {
    let total_start = Instant::now();
    request.validate()?;

    // ── Step 1: Resolve LLM client ───────────────────────────────────────
    let client = resolve_client(config)?;

    // ── Step 2: Extract and clean text ───────────────────────────────────
    let extract_start = Instant::now();
    let extracted = extract_clean(doc, config).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    let extracted_chars = extracted.char_count();

    // ── Step 3: Topics ───────────────────────────────────────────────────
    let mut effective = request.clone();
    let topics = if request.discover_topics {
        let discovered = discover_from_text(client.as_ref(), extracted.text(), config).await;
        if effective.topic_filter.is_empty() {
            effective = effective.with_topics(&discovered);
        }
        discovered
    } else {
        request.topic_filter.clone()
    };
    if !effective.topic_filter.is_empty() {
        debug!("Active topic filter: {}", effective.topic_filter.join(", "));
    }

    // ── Step 4: Chunk ────────────────────────────────────────────────────
    let chunks = Chunker::new(config.max_chunk_size, config.chunk_overlap)?
        .with_lookback(config.boundary_lookback)
        .split(extracted.text());

    // ── Step 5: Generate ─────────────────────────────────────────────────
    let run = QuestionGenerator::new(Arc::clone(&client), config)
        .generate(&chunks, &effective)
        .await?;

    // ── Step 6: Recommendations ──────────────────────────────────────────
    let recommendations = if request.recommendations > 0 {
        recommend(&effective.topic_filter, request.recommendations, config).await
    } else {
        Vec::new()
    };

    let stats = GenerationStats {
        extracted_chars,
        chunk_count: chunks.len(),
        questions_per_chunk: run.questions_per_chunk,
        pool_size: run.pool_size,
        returned: run.questions.len(),
        failed_chunks: run.failed_chunks(),
        total_input_tokens: run.total_input_tokens(),
        total_output_tokens: run.total_output_tokens(),
        extract_duration_ms,
        llm_duration_ms: run.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Quiz complete: {}/{} questions from {} chunks ({} failed), {}ms total",
        stats.returned,
        request.total_questions,
        stats.chunk_count,
        stats.failed_chunks,
        stats.total_duration_ms
    );

    Ok(GenerationOutput {
        questions: run.questions,
        topics,
        recommendations,
        chunks: run.reports,
        source: extracted.source(),
        stats,
    })
}

/// Generate a quiz and write the full output as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_quiz_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationStats, QuizError> {
    let output = generate_quiz(input_str, request, config).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| QuizError::Internal(format!("JSON serialisation failed: {e}")))?;
    write_atomic(output_path.as_ref(), json.as_bytes()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate_quiz`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_quiz_sync(
    input_str: impl AsRef<str>,
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_quiz(input_str, request, config))
}

/// Extract and clean a document's text without calling the LLM.
///
/// Does not require an LLM provider or API key.
pub async fn extract_document(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<ExtractedText, QuizError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    extract_clean(doc, config).await
}

/// Run only the topic pre-pass on a document.
pub async fn discover_topics(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<Vec<String>, QuizError> {
    let client = resolve_client(config)?;
    let extracted = extract_document(input_str, config).await?;
    Ok(discover_from_text(client.as_ref(), extracted.text(), config).await)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn extract_clean(doc: Document, config: &GenerationConfig) -> Result<ExtractedText, QuizError> {
    let filename = doc.filename().to_string();
    let extracted = TextExtractor::from_config(config)
        .extract_async(doc)
        .await?
        .cleaned();

    if extracted.is_blank() {
        return Err(QuizError::ExtractionFailed {
            filename,
            detail: "only whitespace or invisible characters were extracted".to_string(),
        });
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(extracted.char_count(), extracted.source());
    }
    Ok(extracted)
}

async fn discover_from_text(client: &dyn LlmClient, text: &str, config: &GenerationConfig) -> Vec<String> {
    let preview = preview_words(text, config.topic_preview_words);
    extract_topics(client, &preview, config.max_topics).await
}

/// Injected search first, then a YouTube key from config or environment.
fn resolve_video_search(config: &GenerationConfig) -> Option<Arc<dyn VideoSearch>> {
    if let Some(ref search) = config.video_search {
        return Some(Arc::clone(search));
    }
    config
        .youtube_api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(YouTubeSearch::new)
        .or_else(YouTubeSearch::from_env)
        .map(|yt| Arc::new(yt) as Arc<dyn VideoSearch>)
}

async fn recommend(topics: &[String], per_topic: usize, config: &GenerationConfig) -> Vec<VideoRecommendation> {
    if topics.is_empty() {
        debug!("No topics, skipping video recommendations");
        return Vec::new();
    }
    match resolve_video_search(config) {
        Some(search) => recommend_for_topics(search.as_ref(), topics, per_topic).await,
        None => {
            info!("No YouTube API key configured, skipping video recommendations");
            Vec::new()
        }
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), QuizError> {
    let write_err = |e| QuizError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
