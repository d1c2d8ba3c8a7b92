//! CLI binary for pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` / `GenerationRequest` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2quiz::{
    discover_topics, extract_document, generate_quiz, generate_quiz_to_file, GenerationConfig,
    GenerationOutput, GenerationProgressCallback, GenerationRequest, ProgressCallback,
    ResponseFormat, TextSource,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner during extraction, then a bar over
/// chunks. Chunks complete out of order, so start times are keyed by index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, chunk_index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&chunk_index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, chars: usize, source: TextSource) {
        let how = match source {
            TextSource::Native => "text layer",
            TextSource::Optical => "OCR",
            TextSource::Mixed => "text layer + OCR",
        };
        self.bar.println(format!(
            "{} Extracted {} chars {}",
            cyan("◆"),
            bold(&chars.to_string()),
            dim(&format!("({how})"))
        ));
    }

    fn on_generation_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
    }

    fn on_chunk_start(&self, chunk_index: usize, _total_chunks: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(chunk_index, Instant::now());
        }
        self.bar.set_message(format!("chunk {}", chunk_index + 1));
    }

    fn on_chunk_complete(&self, chunk_index: usize, total_chunks: usize, questions: usize) {
        let secs = self.elapsed_secs(chunk_index);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            chunk_index + 1,
            total_chunks,
            dim(&format!("{questions:>2} questions")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk_index: usize, total_chunks: usize, error: &str) {
        let secs = self.elapsed_secs(chunk_index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk_index + 1,
            total_chunks,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, total_chunks: usize, pool_size: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} candidate questions from {} chunks",
                green("✔"),
                bold(&pool_size.to_string()),
                total_chunks
            );
        } else {
            eprintln!(
                "{} {} candidate questions from {} chunks  ({} failed)",
                if failed == total_chunks {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&pool_size.to_string()),
                total_chunks,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five medium questions from a PDF (stdout)
  pdf2quiz lecture.pdf

  # Ten hard questions, written to a JSON file
  pdf2quiz -n 10 -d Hard lecture.pdf -o quiz.json

  # Restrict to topics, or let the model discover them
  pdf2quiz --topics "Mitosis,Meiosis" biology.pdf
  pdf2quiz --discover-topics --recommendations 2 biology.pdf

  # Scanned document (needs tesseract on PATH)
  pdf2quiz --ocr-lang deu scan.pdf

  # From a URL, full JSON output with per-chunk reports
  pdf2quiz --json https://example.org/notes.pdf > quiz.json

  # Diagnostics: extracted text only / topics only
  pdf2quiz --extract-only scan.pdf
  pdf2quiz --topics-only lecture.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  YOUTUBE_API_KEY         YouTube Data API v3 key for --recommendations
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDF2QUIZ_*              Every flag below has a matching variable

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Generate:        pdf2quiz lecture.pdf -n 10

  Scanned PDFs and images need the tesseract binary:
    apt install tesseract-ocr   |   brew install tesseract
"#;

/// Generate multiple-choice quizzes from documents using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Generate multiple-choice quizzes from PDF, text, and scanned documents using LLMs",
    long_about = "Extract text from a document (local file or URL), split it into overlapping \
chunks, and ask an LLM for multiple-choice questions on each chunk. Every question is validated \
(four options, answer among them, explanation present) before it is returned. Scanned pages fall \
back to Tesseract OCR. Supports OpenAI, Anthropic, Google Gemini, Ollama, and any provider \
edgequake-llm can reach.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF, text, or image file path, or an HTTP/HTTPS URL.
    input: String,

    /// Write the full JSON output to this file instead of printing the quiz.
    #[arg(short, long, env = "PDF2QUIZ_OUTPUT")]
    output: Option<PathBuf>,

    /// Number of questions to return (at most).
    #[arg(short = 'n', long, env = "PDF2QUIZ_QUESTIONS", default_value_t = 5,
          value_parser = clap::value_parser!(u16).range(1..))]
    questions: u16,

    /// Difficulty label passed to the model (Easy, Medium, Hard, or any text).
    #[arg(short, long, env = "PDF2QUIZ_DIFFICULTY", default_value = "Medium")]
    difficulty: String,

    /// Comma-separated topics the questions must relate to.
    #[arg(long, env = "PDF2QUIZ_TOPICS", value_delimiter = ',')]
    topics: Vec<String>,

    /// Ask the model for the document's topics first.
    #[arg(long, env = "PDF2QUIZ_DISCOVER_TOPICS")]
    discover_topics: bool,

    /// Videos to recommend per topic (needs YOUTUBE_API_KEY). 0 disables.
    #[arg(long, env = "PDF2QUIZ_RECOMMENDATIONS", default_value_t = 0)]
    recommendations: usize,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Reply shape requested from the model.
    #[arg(long, env = "PDF2QUIZ_FORMAT", value_enum, default_value = "json")]
    format: FormatArg,

    /// Maximum characters per chunk.
    #[arg(long, env = "PDF2QUIZ_CHUNK_SIZE", default_value_t = 4000)]
    chunk_size: usize,

    /// Characters shared by adjacent chunks (must be < chunk size).
    #[arg(long, env = "PDF2QUIZ_CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// Number of concurrent LLM calls.
    #[arg(short, long, env = "PDF2QUIZ_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2QUIZ_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "PDF2QUIZ_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per chunk on LLM failure.
    #[arg(long, env = "PDF2QUIZ_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Disable the OCR fallback for scanned pages.
    #[arg(long, env = "PDF2QUIZ_NO_OCR")]
    no_ocr: bool,

    /// Tesseract language code(s), e.g. eng, deu, eng+fra.
    #[arg(long, env = "PDF2QUIZ_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Rendering DPI for OCR (72–600).
    #[arg(long, env = "PDF2QUIZ_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    ocr_dpi: u32,

    /// Native text shorter than this triggers OCR.
    #[arg(long, env = "PDF2QUIZ_MIN_NATIVE_CHARS", default_value_t = 100)]
    min_native_chars: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2QUIZ_PASSWORD")]
    password: Option<String>,

    /// YouTube Data API v3 key.
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    youtube_api_key: Option<String>,

    /// Output structured JSON (GenerationOutput) instead of a readable quiz.
    #[arg(long, env = "PDF2QUIZ_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Print the extracted text only; no LLM calls.
    #[arg(long, conflicts_with = "topics_only")]
    extract_only: bool,

    /// Print the discovered topics only.
    #[arg(long)]
    topics_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2QUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2QUIZ_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2QUIZ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-chunk LLM call timeout in seconds.
    #[arg(long, env = "PDF2QUIZ_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Json,
    Labeled,
}

impl From<FormatArg> for ResponseFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Json => ResponseFormat::Json,
            FormatArg::Labeled => ResponseFormat::Labeled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let diagnostic = cli.extract_only || cli.topics_only;
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !diagnostic;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Diagnostic modes ─────────────────────────────────────────────────
    if cli.extract_only {
        let extracted = extract_document(&cli.input, &config)
            .await
            .context("Text extraction failed")?;
        let mut out = io::stdout().lock();
        out.write_all(extracted.text().as_bytes())
            .context("Failed to write to stdout")?;
        out.write_all(b"\n").ok();
        if !cli.quiet {
            eprintln!(
                "{} chars ({:?}: {} native, {} OCR)",
                extracted.char_count(),
                extracted.source(),
                extracted.native_chars(),
                extracted.optical_chars()
            );
        }
        return Ok(());
    }

    if cli.topics_only {
        let topics = discover_topics(&cli.input, &config)
            .await
            .context("Topic discovery failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&topics).context("Failed to serialise topics")?);
        } else {
            for t in &topics {
                println!("{t}");
            }
        }
        return Ok(());
    }

    let request = build_request(&cli);

    // ── Generate ─────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = generate_quiz_to_file(&cli.input, output_path, &request, &config)
            .await
            .context("Quiz generation failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} questions  {}ms  →  {}",
                if stats.failed_chunks == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.returned,
                request.total_questions,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
    } else {
        let output = generate_quiz(&cli.input, &request, &config)
            .await
            .context("Quiz generation failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            print_quiz(&output).context("Failed to write to stdout")?;
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "   {}/{} questions  ·  {} tokens in  /  {} tokens out  —  {}ms total",
                output.stats.returned,
                request.total_questions,
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .max_chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .concurrency(cli.concurrency)
        .response_format(cli.format.clone().into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .ocr_enabled(!cli.no_ocr)
        .ocr_language(cli.ocr_lang.clone())
        .ocr_dpi(cli.ocr_dpi)
        .min_native_chars(cli.min_native_chars)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref key) = cli.youtube_api_key {
        builder = builder.youtube_api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_request(cli: &Cli) -> GenerationRequest {
    GenerationRequest::new(cli.questions as usize, cli.difficulty.clone())
        .with_topics(&cli.topics)
        .with_topic_discovery(cli.discover_topics)
        .with_recommendations(cli.recommendations)
}

/// Human-readable quiz on stdout.
fn print_quiz(output: &GenerationOutput) -> io::Result<()> {
    let mut out = io::stdout().lock();

    if !output.topics.is_empty() {
        writeln!(out, "{} {}\n", bold("Topics:"), output.topics.join(", "))?;
    }

    for (i, q) in output.questions.iter().enumerate() {
        writeln!(out, "{}", bold(&format!("{}. {}", i + 1, q.question)))?;
        for (j, option) in q.options.iter().enumerate() {
            let letter = (b'A' + j as u8) as char;
            if j == q.answer_index() {
                writeln!(out, "   {} {}", green(&format!("{letter})")), green(option))?;
            } else {
                writeln!(out, "   {letter}) {option}")?;
            }
        }
        writeln!(out, "   {}\n", dim(&q.explanation))?;
    }

    if !output.recommendations.is_empty() {
        writeln!(out, "{}", bold("Recommended videos:"))?;
        for v in &output.recommendations {
            writeln!(
                out,
                "  • {}  {}  {}",
                v.title,
                dim(&format!("[{}] {}", v.duration, v.channel)),
                cyan(&v.link)
            )?;
        }
    }

    Ok(())
}
