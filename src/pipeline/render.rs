//! PDF access via pdfium: native text layer and page rasterisation.
//!
//! Both operations are CPU-bound and pdfium keeps thread-local state, so
//! callers run them inside `tokio::task::spawn_blocking` (the extractor does
//! this for the whole extraction pass).
//!
//! The backend sits behind the [`PdfBackend`] trait so the extraction
//! strategy can be exercised with synthetic "scanned" documents in tests.

use crate::error::BackendError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Native text extraction and rasterisation for PDF documents.
pub trait PdfBackend: Send + Sync {
    /// Text layer of every page, in page order.
    fn page_texts(&self, bytes: &[u8], password: Option<&str>) -> Result<Vec<String>, BackendError>;

    /// Render every page at `dpi`, capping either dimension at `max_pixels`.
    ///
    /// Pages that fail to render are logged and skipped.
    fn rasterize(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, BackendError>;
}

/// [`PdfBackend`] backed by the pdfium shared library.
///
/// Library lookup order: `PDFIUM_LIB_PATH` (file or directory), the current
/// working directory, then the system library path.
#[derive(Debug, Default, Clone)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific pdfium library file or the directory containing it.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, BackendError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let lib = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                Pdfium::bind_to_library(&lib)
                    .map_err(|e| BackendError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display())))?
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| BackendError::PdfiumBindingFailed(format!("{e:?}")))?,
        };

        Ok(Pdfium::new(bindings))
    }
}

/// Map a pdfium load error onto the password / corruption taxonomy.
fn load_error(e: PdfiumError, password: Option<&str>) -> BackendError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            BackendError::WrongPassword
        } else {
            BackendError::PasswordRequired
        }
    } else {
        BackendError::CorruptPdf(err_str)
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_texts(&self, bytes: &[u8], password: Option<&str>) -> Result<Vec<String>, BackendError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| load_error(e, password))?;

        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| BackendError::PageFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?
                .all();
            debug!("Page {}: {} chars of native text", idx + 1, text.len());
            texts.push(text);
        }

        info!("Native text layer read from {} pages", texts.len());
        Ok(texts)
    }

    fn rasterize(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, BackendError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| load_error(e, password))?;

        // PDF user space is 72 units per inch.
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);

        let pages = document.pages();
        let mut images = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            match page.render_with_config(&render_config) {
                Ok(bitmap) => {
                    let image = bitmap.as_image();
                    debug!(
                        "Rendered page {} → {}x{} px",
                        idx + 1,
                        image.width(),
                        image.height()
                    );
                    images.push(image);
                }
                Err(e) => warn!("Skipping page {}: rasterisation failed: {:?}", idx + 1, e),
            }
        }

        Ok(images)
    }
}
