//! Configuration types for quiz generation.
//!
//! Process-wide knobs live in [`GenerationConfig`], built once at startup via
//! [`GenerationConfigBuilder`] and passed by reference into every stage. The
//! collaborators the pipeline talks to (LLM client, PDF backend, OCR engine,
//! video search, progress callback) are injected here too, so tests can swap
//! any of them for a fake without touching global state.
//!
//! Per-request parameters (how many questions, what difficulty, which topics)
//! live in [`GenerationRequest`].

use crate::error::QuizError;
use crate::pipeline::llm::LlmClient;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::PdfBackend;
use crate::progress::ProgressCallback;
use crate::recommend::VideoSearch;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for the extraction → chunking → generation pipeline.
///
/// # Example
/// ```rust
/// use pdf2quiz::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .max_chunk_size(4000)
///     .chunk_overlap(200)
///     .concurrency(5)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    // ── Extraction ───────────────────────────────────────────────────────
    /// Native text shorter than this (trimmed, in characters) triggers the
    /// optical path. Default: 100.
    pub min_native_chars: usize,

    /// Allow the optical (OCR) fallback. Default: true.
    ///
    /// When no [`OcrEngine`] is injected, the Tesseract CLI is used if it is
    /// installed; otherwise optical extraction is simply unavailable.
    pub ocr_enabled: bool,

    /// Rasterisation DPI for the optical path. Range: 72–600. Default: 300.
    pub ocr_dpi: u32,

    /// Tesseract language code. Default: "eng".
    pub ocr_language: String,

    /// Cap on either dimension of a rasterised page, in pixels. Default: 4000.
    ///
    /// 300 DPI on an A4 page is about 2480 × 3508 px; the cap only bites on
    /// oversized pages (posters, plans) where it keeps memory bounded.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    // ── Chunking ─────────────────────────────────────────────────────────
    /// Maximum characters per chunk. Default: 4000.
    pub max_chunk_size: usize,

    /// Characters shared between adjacent chunks. Default: 200.
    pub chunk_overlap: usize,

    /// How far back from a hard cut the chunker looks for a paragraph or
    /// sentence boundary, in characters. Default: 200.
    pub boundary_lookback: usize,

    // ── Topics ───────────────────────────────────────────────────────────
    /// Words of the document sent to the topic pre-pass. Default: 2000.
    pub topic_preview_words: usize,

    /// Upper bound on topic labels kept. Default: 10.
    pub max_topics: usize,

    // ── LLM ──────────────────────────────────────────────────────────────
    /// Response shape requested from the model. Default: [`ResponseFormat::Json`].
    pub response_format: ResponseFormat,

    /// Number of concurrent LLM calls. Default: 5.
    pub concurrency: usize,

    /// LLM model identifier. If None, uses "gpt-4.1-mini".
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed client. Takes precedence over every provider setting.
    pub llm_client: Option<Arc<dyn LlmClient>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Retries on a failed LLM call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-chunk LLM call timeout in seconds. Default: 60.
    ///
    /// A chunk that times out contributes zero questions; its siblings are
    /// unaffected.
    pub api_timeout_secs: u64,

    // ── Collaborators ────────────────────────────────────────────────────
    /// PDF backend override. Default: pdfium.
    pub pdf_backend: Option<Arc<dyn PdfBackend>>,

    /// OCR engine override. Default: Tesseract CLI when installed.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Video search override. Default: YouTube when an API key is available.
    pub video_search: Option<Arc<dyn VideoSearch>>,

    /// YouTube Data API key. Falls back to `YOUTUBE_API_KEY`.
    pub youtube_api_key: Option<String>,

    /// Optional per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,

    // ── Input ────────────────────────────────────────────────────────────
    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_native_chars: 100,
            ocr_enabled: true,
            ocr_dpi: 300,
            ocr_language: "eng".to_string(),
            max_rendered_pixels: 4000,
            password: None,
            max_chunk_size: 4000,
            chunk_overlap: 200,
            boundary_lookback: 200,
            topic_preview_words: 2000,
            max_topics: 10,
            response_format: ResponseFormat::default(),
            concurrency: 5,
            model: None,
            provider_name: None,
            provider: None,
            llm_client: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            pdf_backend: None,
            ocr_engine: None,
            video_search: None,
            youtube_api_key: None,
            progress_callback: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("min_native_chars", &self.min_native_chars)
            .field("ocr_enabled", &self.ocr_enabled)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("ocr_language", &self.ocr_language)
            .field("max_chunk_size", &self.max_chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("response_format", &self.response_format)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("llm_client", &self.llm_client.as_ref().map(|_| "<dyn LlmClient>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdf_backend", &self.pdf_backend.as_ref().map(|_| "<dyn PdfBackend>"))
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("video_search", &self.video_search.as_ref().map(|_| "<dyn VideoSearch>"))
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn min_native_chars(mut self, n: usize) -> Self {
        self.config.min_native_chars = n;
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_chunk_size(mut self, n: usize) -> Self {
        self.config.max_chunk_size = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn boundary_lookback(mut self, n: usize) -> Self {
        self.config.boundary_lookback = n;
        self
    }

    pub fn topic_preview_words(mut self, n: usize) -> Self {
        self.config.topic_preview_words = n.max(1);
        self
    }

    pub fn max_topics(mut self, n: usize) -> Self {
        self.config.max_topics = n.max(1);
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.config.response_format = format;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn llm_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.config.llm_client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.pdf_backend = Some(backend);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn video_search(mut self, search: Arc<dyn VideoSearch>) -> Self {
        self.config.video_search = Some(search);
        self
    }

    pub fn youtube_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.youtube_api_key = Some(key.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, QuizError> {
        let c = &self.config;
        if c.max_chunk_size == 0 || c.chunk_overlap >= c.max_chunk_size {
            return Err(QuizError::InvalidChunkConfig {
                max_chunk_size: c.max_chunk_size,
                overlap: c.chunk_overlap,
            });
        }
        if c.ocr_dpi < 72 || c.ocr_dpi > 600 {
            return Err(QuizError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                c.ocr_dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(QuizError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(QuizError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Request ──────────────────────────────────────────────────────────────

/// What the caller wants generated from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Upper bound on returned questions. Must be ≥ 1.
    pub total_questions: usize,

    /// Difficulty label passed verbatim to the model.
    ///
    /// [`Difficulty`] lists the usual values, but any text is accepted.
    pub difficulty: String,

    /// Restrict questions to these topics. Empty means no filter.
    pub topic_filter: Vec<String>,

    /// Run the topic pre-pass. Discovered topics are always returned, and
    /// become the filter when `topic_filter` is empty.
    pub discover_topics: bool,

    /// Video references to look up per topic. 0 disables the lookup.
    pub recommendations: usize,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            total_questions: 5,
            difficulty: Difficulty::Medium.to_string(),
            topic_filter: Vec::new(),
            discover_topics: false,
            recommendations: 0,
        }
    }
}

impl GenerationRequest {
    pub fn new(total_questions: usize, difficulty: impl Into<String>) -> Self {
        Self {
            total_questions,
            difficulty: difficulty.into(),
            ..Default::default()
        }
    }

    /// Set the topic filter; labels are trimmed and de-duplicated, order kept.
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = std::collections::HashSet::new();
        self.topic_filter = topics
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        self
    }

    pub fn with_topic_discovery(mut self, v: bool) -> Self {
        self.discover_topics = v;
        self
    }

    pub fn with_recommendations(mut self, per_topic: usize) -> Self {
        self.recommendations = per_topic;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), QuizError> {
        if self.total_questions == 0 {
            return Err(QuizError::InvalidRequest(
                "total_questions must be a positive integer".into(),
            ));
        }
        if self.difficulty.trim().is_empty() {
            return Err(QuizError::InvalidRequest(
                "difficulty must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Conventional difficulty labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => f.write_str("Easy"),
            Difficulty::Medium => f.write_str("Medium"),
            Difficulty::Hard => f.write_str("Hard"),
        }
    }
}

/// Which response shape the model is asked to produce.
///
/// The parser always accepts both; this only decides which prompt is sent and
/// which parser runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseFormat {
    /// A JSON array of `{question, options, answer, explanation}` objects. (default)
    #[default]
    Json,
    /// Plain-text `Question:` / `A)`..`D)` / `Correct Answer:` / `Explanation:` blocks.
    Labeled,
}
