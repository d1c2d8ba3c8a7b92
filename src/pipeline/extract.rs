//! Text extraction with an optical fallback for scanned pages.
//!
//! ## Strategy (PDF)
//!
//! 1. Read the native text layer page by page.
//! 2. If the trimmed result is shorter than `min_native_chars` and an OCR
//!    engine is available, rasterise every page, OCR it, and **append** the
//!    recognised text.
//! 3. If native extraction fails outright and OCR is available, use the OCR
//!    output **instead**.
//! 4. Without OCR, keep whatever native text exists.
//!
//! Optical failures never propagate: a page that fails to rasterise or
//! recognise contributes an empty string. Only when every strategy comes back
//! empty does extraction fail with [`QuizError::ExtractionFailed`].

use crate::config::GenerationConfig;
use crate::error::QuizError;
use crate::pipeline::clean::clean_extracted_text;
use crate::pipeline::input::{Document, MediaType};
use crate::pipeline::ocr::{OcrEngine, TesseractOcr};
use crate::pipeline::render::{PdfBackend, PdfiumBackend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the extracted text came from. Used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSource {
    /// Text layer (or plain-text file) only.
    Native,
    /// OCR only.
    Optical,
    /// Short native text with OCR output appended.
    Mixed,
}

/// Non-empty text extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    text: String,
    source: TextSource,
    native_chars: usize,
    optical_chars: usize,
}

impl ExtractedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn source(&self) -> TextSource {
        self.source
    }

    /// Characters contributed by the native text layer.
    pub fn native_chars(&self) -> usize {
        self.native_chars
    }

    /// Characters contributed by OCR.
    pub fn optical_chars(&self) -> usize {
        self.optical_chars
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Normalise the text with [`clean_extracted_text`].
    pub fn cleaned(self) -> Self {
        Self {
            text: clean_extracted_text(&self.text),
            ..self
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Runs the extraction strategy against injected backends.
#[derive(Clone)]
pub struct TextExtractor {
    pdf: Arc<dyn PdfBackend>,
    ocr: Option<Arc<dyn OcrEngine>>,
    min_native_chars: usize,
    ocr_dpi: u32,
    max_rendered_pixels: u32,
    password: Option<String>,
}

impl TextExtractor {
    /// Build an extractor with default thresholds (100 chars, 300 DPI).
    pub fn new(pdf: Arc<dyn PdfBackend>, ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        let defaults = GenerationConfig::default();
        Self {
            pdf,
            ocr,
            min_native_chars: defaults.min_native_chars,
            ocr_dpi: defaults.ocr_dpi,
            max_rendered_pixels: defaults.max_rendered_pixels,
            password: None,
        }
    }

    /// Resolve backends from the config: injected ones first, then pdfium
    /// and (when enabled and installed) the Tesseract CLI.
    pub fn from_config(config: &GenerationConfig) -> Self {
        let pdf = config
            .pdf_backend
            .clone()
            .unwrap_or_else(|| Arc::new(PdfiumBackend::new()) as Arc<dyn PdfBackend>);

        let ocr = if !config.ocr_enabled {
            None
        } else if let Some(ref engine) = config.ocr_engine {
            Some(Arc::clone(engine))
        } else {
            let tesseract = TesseractOcr::new(config.ocr_language.clone());
            if tesseract.is_available() {
                Some(Arc::new(tesseract) as Arc<dyn OcrEngine>)
            } else {
                info!("OCR fallback unavailable: tesseract not installed");
                None
            }
        };

        Self {
            pdf,
            ocr,
            min_native_chars: config.min_native_chars,
            ocr_dpi: config.ocr_dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }

    pub fn with_min_native_chars(mut self, n: usize) -> Self {
        self.min_native_chars = n;
        self
    }

    pub fn with_ocr_dpi(mut self, dpi: u32) -> Self {
        self.ocr_dpi = dpi;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Whether the optical path is available.
    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Extract text on a blocking-pool thread.
    pub async fn extract_async(&self, doc: Document) -> Result<ExtractedText, QuizError> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&doc))
            .await
            .map_err(|e| QuizError::Internal(format!("Extraction task panicked: {}", e)))?
    }

    /// Extract text from `doc`. Blocking.
    pub fn extract(&self, doc: &Document) -> Result<ExtractedText, QuizError> {
        let attempt = match doc.media_type() {
            MediaType::Pdf => self.extract_pdf(doc.bytes()),
            MediaType::PlainText => {
                let text = String::from_utf8_lossy(doc.bytes()).to_string();
                Attempt::native(text, None)
            }
            MediaType::Image => self.extract_image(doc.bytes()),
        };

        if attempt.text.trim().is_empty() {
            let mut detail = match attempt.native_error {
                Some(ref e) => format!("Native extraction failed: {e}."),
                None => "The document has no text layer.".to_string(),
            };
            if self.has_ocr() {
                detail.push_str(" OCR produced no text.");
            } else {
                detail.push_str(" OCR is unavailable (install tesseract-ocr).");
            }
            return Err(QuizError::ExtractionFailed {
                filename: doc.filename().to_string(),
                detail,
            });
        }

        info!(
            "Extracted {} chars from '{}' ({:?}: {} native, {} optical)",
            attempt.text.chars().count(),
            doc.filename(),
            attempt.source,
            attempt.native_chars,
            attempt.optical_chars
        );

        Ok(ExtractedText {
            text: attempt.text,
            source: attempt.source,
            native_chars: attempt.native_chars,
            optical_chars: attempt.optical_chars,
        })
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Attempt {
        let password = self.password.as_deref();

        let native = match self.pdf.page_texts(bytes, password) {
            Ok(pages) => pages.join("\n"),
            Err(e) => {
                warn!("Native text extraction failed: {}", e);
                return match self.ocr {
                    Some(ref engine) => {
                        info!("Falling back to OCR for the whole document");
                        Attempt::optical(self.run_optical(engine.as_ref(), bytes))
                            .with_native_error(e.to_string())
                    }
                    None => Attempt::native(String::new(), Some(e.to_string())),
                };
            }
        };

        let native_len = native.trim().chars().count();
        if native_len >= self.min_native_chars {
            return Attempt::native(native, None);
        }

        let Some(ref engine) = self.ocr else {
            debug!(
                "Native text is short ({} < {} chars) and OCR is unavailable",
                native_len, self.min_native_chars
            );
            return Attempt::native(native, None);
        };

        info!(
            "Native text is short ({} < {} chars); running OCR",
            native_len, self.min_native_chars
        );
        let optical = self.run_optical(engine.as_ref(), bytes);

        if native.trim().is_empty() {
            return Attempt::optical(optical);
        }
        if optical.trim().is_empty() {
            return Attempt::native(native, None);
        }
        let native_chars = native.chars().count();
        let optical_chars = optical.chars().count();
        Attempt {
            text: format!("{}\n{}", native.trim_end(), optical),
            source: TextSource::Mixed,
            native_chars,
            optical_chars,
            native_error: None,
        }
    }

    fn extract_image(&self, bytes: &[u8]) -> Attempt {
        let Some(ref engine) = self.ocr else {
            return Attempt::native(String::new(), Some("image documents need OCR".into()));
        };
        let text = match image::load_from_memory(bytes) {
            Ok(img) => engine.ocr(&img).unwrap_or_else(|e| {
                warn!("OCR failed on image document: {}", e);
                String::new()
            }),
            Err(e) => {
                warn!("Could not decode image document: {}", e);
                String::new()
            }
        };
        Attempt::optical(text)
    }

    /// Rasterise and OCR every page. Never fails; errors degrade to "".
    fn run_optical(&self, engine: &dyn OcrEngine, bytes: &[u8]) -> String {
        let images = match self.pdf.rasterize(
            bytes,
            self.password.as_deref(),
            self.ocr_dpi,
            self.max_rendered_pixels,
        ) {
            Ok(images) => images,
            Err(e) => {
                warn!("Rasterisation for OCR failed: {}", e);
                return String::new();
            }
        };

        let total = images.len();
        images
            .iter()
            .enumerate()
            .map(|(idx, img)| match engine.ocr(img) {
                Ok(text) => {
                    debug!("OCR page {}/{}: {} chars", idx + 1, total, text.len());
                    text
                }
                Err(e) => {
                    warn!("OCR failed on page {}/{}: {}", idx + 1, total, e);
                    String::new()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Intermediate result; may be empty.
struct Attempt {
    text: String,
    source: TextSource,
    native_chars: usize,
    optical_chars: usize,
    native_error: Option<String>,
}

impl Attempt {
    fn native(text: String, native_error: Option<String>) -> Self {
        Self {
            native_chars: text.chars().count(),
            text,
            source: TextSource::Native,
            optical_chars: 0,
            native_error,
        }
    }

    fn optical(text: String) -> Self {
        Self {
            optical_chars: text.chars().count(),
            text,
            source: TextSource::Optical,
            native_chars: 0,
            native_error: None,
        }
    }

    fn with_native_error(mut self, error: String) -> Self {
        self.native_error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, OcrError};
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake PDF: fixed page texts (or a load error) and `pages` blank images.
    struct FakePdf {
        texts: Result<Vec<String>, BackendError>,
        pages: usize,
        raster_fails: bool,
    }

    impl FakePdf {
        fn with_text(texts: &[&str]) -> Self {
            Self {
                texts: Ok(texts.iter().map(|s| s.to_string()).collect()),
                pages: texts.len(),
                raster_fails: false,
            }
        }

        fn broken(pages: usize) -> Self {
            Self {
                texts: Err(BackendError::CorruptPdf("xref table broken".into())),
                pages,
                raster_fails: false,
            }
        }
    }

    impl PdfBackend for FakePdf {
        fn page_texts(&self, _: &[u8], _: Option<&str>) -> Result<Vec<String>, BackendError> {
            self.texts.clone()
        }

        fn rasterize(
            &self,
            _: &[u8],
            _: Option<&str>,
            _: u32,
            _: u32,
        ) -> Result<Vec<DynamicImage>, BackendError> {
            if self.raster_fails {
                return Err(BackendError::CorruptPdf("cannot render".into()));
            }
            Ok((0..self.pages)
                .map(|_| DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))))
                .collect())
        }
    }

    /// Fake OCR: returns numbered page text, counting calls.
    struct FakeOcr {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeOcr {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    impl OcrEngine for FakeOcr {
        fn ocr(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(OcrError::Failed("engine crashed".into()));
            }
            Ok(format!("scanned page {n} describes the water cycle in detail"))
        }
    }

    fn pdf_doc() -> Document {
        Document::with_media_type(b"%PDF-1.7".to_vec(), "notes.pdf", MediaType::Pdf)
    }

    fn long_text() -> String {
        "Evaporation moves water from oceans into the atmosphere. ".repeat(5)
    }

    #[test]
    fn sufficient_native_text_skips_ocr() {
        let text = long_text();
        let ocr = FakeOcr::new();
        let extractor = TextExtractor::new(
            Arc::new(FakePdf::with_text(&[&text, "page two"])),
            Some(ocr.clone()),
        );
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.source(), TextSource::Native);
        assert_eq!(out.text(), format!("{text}\npage two"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scanned_document_uses_ocr() {
        let ocr = FakeOcr::new();
        let extractor = TextExtractor::new(Arc::new(FakePdf::with_text(&["", " "])), Some(ocr.clone()));
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.source(), TextSource::Optical);
        assert!(out.text().contains("scanned page 1"));
        assert!(out.text().contains("\nscanned page 2"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn short_native_text_gets_ocr_appended() {
        let extractor = TextExtractor::new(
            Arc::new(FakePdf::with_text(&["Chapter 1"])),
            Some(FakeOcr::new()),
        );
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.source(), TextSource::Mixed);
        assert!(out.text().starts_with("Chapter 1\nscanned page 1"));
        assert_eq!(out.native_chars(), "Chapter 1".len());
        assert!(out.optical_chars() > 0);
    }

    #[test]
    fn native_failure_falls_back_to_ocr_exclusively() {
        let extractor = TextExtractor::new(Arc::new(FakePdf::broken(3)), Some(FakeOcr::new()));
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.source(), TextSource::Optical);
        assert_eq!(out.native_chars(), 0);
        assert_eq!(out.text().lines().count(), 3);
    }

    #[test]
    fn short_native_text_without_ocr_is_kept() {
        let extractor = TextExtractor::new(Arc::new(FakePdf::with_text(&["Just a title"])), None);
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.text(), "Just a title");
        assert_eq!(out.source(), TextSource::Native);
    }

    #[test]
    fn failing_ocr_degrades_to_native_text() {
        let ocr = FakeOcr::failing();
        let extractor = TextExtractor::new(Arc::new(FakePdf::with_text(&["Short"])), Some(ocr.clone()));
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.text(), "Short");
        assert_eq!(out.source(), TextSource::Native);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nothing_extractable_is_an_error() {
        let extractor = TextExtractor::new(Arc::new(FakePdf::with_text(&["", ""])), None);
        let err = extractor.extract(&pdf_doc()).unwrap_err();
        assert!(matches!(err, QuizError::ExtractionFailed { .. }));
        assert!(err.to_string().contains("OCR is unavailable"));

        let mut broken = FakePdf::broken(2);
        broken.raster_fails = true;
        let extractor = TextExtractor::new(Arc::new(broken), Some(FakeOcr::new()));
        let err = extractor.extract(&pdf_doc()).unwrap_err();
        assert!(err.to_string().contains("xref table broken"), "got: {err}");
    }

    #[test]
    fn threshold_is_tunable() {
        let extractor = TextExtractor::new(
            Arc::new(FakePdf::with_text(&["Chapter 1"])),
            Some(FakeOcr::new()),
        )
        .with_min_native_chars(5);
        let out = extractor.extract(&pdf_doc()).expect("extract");
        assert_eq!(out.source(), TextSource::Native);
    }

    #[test]
    fn plain_text_is_native() {
        let extractor = TextExtractor::new(Arc::new(FakePdf::broken(0)), None);
        let doc = Document::new(b"Plain notes about tides.".to_vec(), "tides.txt").expect("doc");
        let out = extractor.extract(&doc).expect("extract");
        assert_eq!(out.text(), "Plain notes about tides.");
        assert_eq!(out.source(), TextSource::Native);
    }

    #[test]
    fn image_documents_go_through_ocr() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode");
        let doc = Document::new(png, "board.png").expect("doc");
        assert_eq!(doc.media_type(), MediaType::Image);

        let without = TextExtractor::new(Arc::new(FakePdf::broken(0)), None);
        assert!(without.extract(&doc).is_err());

        let with = TextExtractor::new(Arc::new(FakePdf::broken(0)), Some(FakeOcr::new()));
        let out = with.extract(&doc).expect("extract");
        assert_eq!(out.source(), TextSource::Optical);
    }

    #[tokio::test]
    async fn async_extraction_runs_on_blocking_pool() {
        let extractor = TextExtractor::new(Arc::new(FakePdf::with_text(&[&long_text()])), None);
        let out = extractor.extract_async(pdf_doc()).await.expect("extract");
        assert_eq!(out.source(), TextSource::Native);
    }
}
