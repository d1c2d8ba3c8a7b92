//! Pipeline stages for document-to-quiz generation.
//!
//! Each submodule implements exactly one transformation step and is
//! testable on its own; the collaborators that touch the outside world
//! (pdfium, tesseract, the LLM) sit behind traits so stages can be driven by
//! fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ clean ──▶ chunk ──▶ generate ──▶ parse
//!           (render,                        (llm,
//!            ocr)                            topics)
//! ```
//!
//! 1. [`input`]    — resolve a path, URL, or byte buffer into a `Document`
//! 2. [`render`]   — pdfium text layer and page rasterisation
//! 3. [`ocr`]      — Tesseract CLI for scanned pages and images
//! 4. [`extract`]  — native-first extraction with the optical fallback; runs
//!    in `spawn_blocking` because pdfium and tesseract block
//! 5. [`clean`]    — deterministic cleanup of extracted text and replies
//! 6. [`chunk`]    — overlapping, boundary-aware windows
//! 7. [`topics`]   — optional topic pre-pass
//! 8. [`llm`]      — the client trait and the retrying provider adapter; the
//!    only stage with network I/O
//! 9. [`generate`] — bounded fan-out over chunks, merge and sample
//! 10. [`parse`]   — JSON-list and labeled-block reply parsers

pub mod chunk;
pub mod clean;
pub mod extract;
pub mod generate;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod parse;
pub mod render;
pub mod topics;
