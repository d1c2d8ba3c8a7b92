//! Progress-callback trait for per-chunk generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline extracts the document and works through its chunks.
//! The CLI uses this to drive its progress bar; a web layer could forward the
//! same events over a socket.
//!
//! # Example
//!
//! ```rust
//! use pdf2quiz::{GenerationProgressCallback, GenerationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     questions: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk_index: usize, total_chunks: usize, questions: usize) {
//!         self.questions.fetch_add(questions, Ordering::SeqCst);
//!         eprintln!("chunk {}/{}: {} questions", chunk_index + 1, total_chunks, questions);
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { questions: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::extract::TextSource;
use std::sync::Arc;

/// Called by the pipeline as it processes a document.
///
/// Chunk events may arrive concurrently from different tasks and in
/// completion order, so implementations must be `Send + Sync` and guard any
/// shared mutable state. Every method defaults to a no-op.
pub trait GenerationProgressCallback: Send + Sync {
    /// Text extraction finished.
    fn on_extraction_complete(&self, chars: usize, source: TextSource) {
        let _ = (chars, source);
    }

    /// Chunking finished; `total_chunks` LLM calls are about to start.
    fn on_generation_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// The LLM request for a chunk is about to be sent. `chunk_index` is 0-based.
    fn on_chunk_start(&self, chunk_index: usize, total_chunks: usize) {
        let _ = (chunk_index, total_chunks);
    }

    /// A chunk produced at least one valid question.
    fn on_chunk_complete(&self, chunk_index: usize, total_chunks: usize, questions: usize) {
        let _ = (chunk_index, total_chunks, questions);
    }

    /// A chunk contributed nothing (call failed, timed out, or unparsable).
    fn on_chunk_error(&self, chunk_index: usize, total_chunks: usize, error: &str) {
        let _ = (chunk_index, total_chunks, error);
    }

    /// All chunks have been attempted. `pool_size` counts valid questions
    /// before sampling.
    fn on_generation_complete(&self, total_chunks: usize, pool_size: usize) {
        let _ = (total_chunks, pool_size);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        questions: AtomicUsize,
        pool: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_chunk_start(&self, _chunk_index: usize, _total_chunks: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _chunk_index: usize, _total_chunks: usize, questions: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.questions.fetch_add(questions, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _chunk_index: usize, _total_chunks: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_generation_complete(&self, _total_chunks: usize, pool_size: usize) {
            self.pool.store(pool_size, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_complete(1200, TextSource::Native);
        cb.on_generation_start(3);
        cb.on_chunk_start(0, 3);
        cb.on_chunk_complete(0, 3, 2);
        cb.on_chunk_error(1, 3, "timeout");
        cb.on_generation_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_chunk_start(0, 3);
        tracker.on_chunk_complete(0, 3, 2);
        tracker.on_chunk_start(1, 3);
        tracker.on_chunk_complete(1, 3, 3);
        tracker.on_chunk_start(2, 3);
        tracker.on_chunk_error(2, 3, "unparsable");
        tracker.on_generation_complete(3, 5);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.questions.load(Ordering::SeqCst), 5);
        assert_eq!(tracker.pool.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_generation_start(10);
        cb.on_chunk_complete(0, 10, 1);
    }
}
