//! Fan chunks out to the model, parse each reply, and sample the final quiz.
//!
//! Each chunk is asked for `floor(total / chunks) + 1` questions so the pool
//! usually overshoots the request a little; the pool is then shuffled and
//! truncated. Chunks run through a `buffer_unordered` stream capped at
//! `concurrency`, and each call is wrapped in its own timeout. A chunk that
//! fails (call error, timeout, unparsable or empty reply) contributes nothing
//! and is recorded in its [`ChunkReport`]; the request only fails when the
//! whole pool is empty.

use crate::config::{GenerationConfig, GenerationRequest, ResponseFormat};
use crate::error::{ChunkError, QuizError};
use crate::output::{ChunkReport, Mcq, QuestionBatch};
use crate::pipeline::chunk::TextChunk;
use crate::pipeline::llm::LlmClient;
use crate::pipeline::parse::{parse_response, ParseOutcome};
use crate::progress::ProgressCallback;
use crate::prompts::{mcq_prompt, mcq_vars};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Questions requested from each chunk: `max(1, floor(total / chunks) + 1)`.
pub fn questions_per_chunk(total_questions: usize, chunk_count: usize) -> usize {
    if chunk_count == 0 {
        return 0;
    }
    (total_questions / chunk_count + 1).max(1)
}

/// Uniformly shuffle `pool` and keep at most `total` questions.
pub fn merge_and_sample<R: Rng + ?Sized>(mut pool: Vec<Mcq>, total: usize, rng: &mut R) -> Vec<Mcq> {
    pool.shuffle(rng);
    pool.truncate(total);
    pool
}

/// Everything the generator learned about one run.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub questions: QuestionBatch,
    /// One report per chunk, ordered by chunk index.
    pub reports: Vec<ChunkReport>,
    pub questions_per_chunk: usize,
    /// Valid questions before sampling.
    pub pool_size: usize,
    pub duration_ms: u64,
}

impl GenerationRun {
    pub fn failed_chunks(&self) -> usize {
        self.reports.iter().filter(|r| r.error.is_some()).count()
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.reports.iter().map(|r| r.input_tokens as u64).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.reports.iter().map(|r| r.output_tokens as u64).sum()
    }
}

/// Runs per-chunk generation against one [`LlmClient`].
#[derive(Clone)]
pub struct QuestionGenerator {
    client: Arc<dyn LlmClient>,
    format: ResponseFormat,
    concurrency: usize,
    timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl QuestionGenerator {
    pub fn new(client: Arc<dyn LlmClient>, config: &GenerationConfig) -> Self {
        Self {
            client,
            format: config.response_format,
            concurrency: config.concurrency.max(1),
            timeout: Duration::from_secs(config.api_timeout_secs),
            progress: config.progress_callback.clone(),
        }
    }

    /// Generate `request.total_questions` questions from `chunks`.
    ///
    /// `request.topic_filter` is the active filter for every chunk prompt.
    pub async fn generate(
        &self,
        chunks: &[TextChunk],
        request: &GenerationRequest,
    ) -> Result<GenerationRun, QuizError> {
        let mut rng = StdRng::from_entropy();
        self.generate_with_rng(chunks, request, &mut rng).await
    }

    /// As [`generate`](Self::generate), sampling with `rng`.
    pub async fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        chunks: &[TextChunk],
        request: &GenerationRequest,
        rng: &mut R,
    ) -> Result<GenerationRun, QuizError> {
        let start = Instant::now();
        let total_chunks = chunks.len();
        let quota = questions_per_chunk(request.total_questions, total_chunks);

        info!(
            "Generating {} questions from {} chunks ({} per chunk, concurrency {})",
            request.total_questions, total_chunks, quota, self.concurrency
        );
        if let Some(ref cb) = self.progress {
            cb.on_generation_start(total_chunks);
        }

        let results: Vec<(Vec<Mcq>, ChunkReport)> = stream::iter(
            chunks
                .iter()
                .map(|chunk| self.process_chunk(chunk, quota, total_chunks, request)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        // Completion order.
        let mut pool = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        for (questions, report) in results {
            pool.extend(questions);
            reports.push(report);
        }
        reports.sort_by_key(|r| r.chunk_index);

        let pool_size = pool.len();
        if let Some(ref cb) = self.progress {
            cb.on_generation_complete(total_chunks, pool_size);
        }

        if pool.is_empty() {
            let first_error = reports
                .iter()
                .find_map(|r| r.error.as_ref().map(|e| e.to_string()))
                .unwrap_or_else(|| "no chunks to process".to_string());
            let raw_output = reports.iter().find_map(|r| r.raw_output.clone());
            if let Some(ref raw) = raw_output {
                warn!("No questions generated. Raw model output of first empty chunk:\n{}", raw);
            }
            return Err(QuizError::NoQuestionsGenerated {
                chunks: total_chunks,
                first_error,
                raw_output,
            });
        }

        let questions = merge_and_sample(pool, request.total_questions, rng);
        info!(
            "Pool of {} questions, returning {} (requested {})",
            pool_size,
            questions.len(),
            request.total_questions
        );

        Ok(GenerationRun {
            questions: QuestionBatch::new(questions),
            reports,
            questions_per_chunk: quota,
            pool_size,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Never fails; failures are folded into the report.
    async fn process_chunk(
        &self,
        chunk: &TextChunk,
        quota: usize,
        total_chunks: usize,
        request: &GenerationRequest,
    ) -> (Vec<Mcq>, ChunkReport) {
        let start = Instant::now();
        let idx = chunk.index;
        let number = idx + 1;
        if let Some(ref cb) = self.progress {
            cb.on_chunk_start(idx, total_chunks);
        }

        let vars = mcq_vars(
            &chunk.text,
            quota,
            &request.difficulty,
            &request.topic_filter,
            self.format,
        );
        let prompt = mcq_prompt(&vars, self.format);

        let mut report = ChunkReport {
            chunk_index: idx,
            requested: quota,
            parsed: 0,
            dropped: 0,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: None,
            raw_output: None,
        };

        let questions = match tokio::time::timeout(self.timeout, self.client.invoke(&prompt)).await {
            Err(_) => {
                report.error = Some(ChunkError::Timeout {
                    chunk: number,
                    secs: self.timeout.as_secs(),
                });
                Vec::new()
            }
            Ok(Err(e)) => {
                report.error = Some(ChunkError::LlmFailed {
                    chunk: number,
                    attempts: e.attempts,
                    detail: e.detail,
                });
                Vec::new()
            }
            Ok(Ok(reply)) => {
                report.input_tokens = reply.input_tokens;
                report.output_tokens = reply.output_tokens;
                match parse_response(&reply.content, self.format) {
                    ParseOutcome::Unparsable { reason } => {
                        report.error = Some(ChunkError::Unparsable {
                            chunk: number,
                            reason,
                        });
                        report.raw_output = Some(reply.content);
                        Vec::new()
                    }
                    ParseOutcome::Parsed { questions, dropped } => {
                        report.parsed = questions.len();
                        report.dropped = dropped;
                        if questions.is_empty() {
                            report.error = Some(ChunkError::Empty {
                                chunk: number,
                                dropped,
                            });
                            report.raw_output = Some(reply.content);
                        }
                        questions
                    }
                }
            }
        };

        report.duration_ms = start.elapsed().as_millis() as u64;

        match report.error {
            None => {
                debug!(
                    "Chunk {}/{}: {} questions ({} dropped) in {}ms",
                    number, total_chunks, report.parsed, report.dropped, report.duration_ms
                );
                if let Some(ref cb) = self.progress {
                    cb.on_chunk_complete(idx, total_chunks, questions.len());
                }
            }
            Some(ref e) => {
                warn!("{}", e);
                if let Some(ref cb) = self.progress {
                    cb.on_chunk_error(idx, total_chunks, &e.to_string());
                }
            }
        }

        (questions, report)
    }
}
