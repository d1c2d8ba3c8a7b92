//! Optical character recognition for scanned pages.
//!
//! The default engine shells out to the `tesseract` CLI: each page image is
//! written to a temporary PNG and read back from tesseract's stdout. The
//! engine is a trait so the extractor can be tested with a fake and so other
//! backends can be plugged in.

use crate::error::OcrError;
use image::DynamicImage;
use std::process::Command;
use tracing::{debug, warn};

/// Recognise the text in one page image.
pub trait OcrEngine: Send + Sync {
    fn ocr(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// [`OcrEngine`] that runs the Tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    language: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
        }
    }

    /// Use a tesseract binary other than the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// `true` when the binary runs and answers `--version`.
    pub fn is_available(&self) -> bool {
        let ok = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !ok {
            debug!("{} not found - install tesseract-ocr for OCR support", self.binary);
        }
        ok
    }
}

impl OcrEngine for TesseractOcr {
    fn ocr(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("pdf2quiz-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Failed(format!("temp file: {e}")))?;

        image
            .write_to(tmp.as_file_mut(), image::ImageFormat::Png)
            .map_err(|e| OcrError::Failed(format!("PNG encode: {e}")))?;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("3")
            .output()
            .map_err(|e| OcrError::Unavailable(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return Err(OcrError::Failed(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("OCR recognised {} chars", text.len());
        Ok(text)
    }
}
