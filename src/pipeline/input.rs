//! Document intake: turn a path, URL, or byte buffer into a [`Document`].
//!
//! The pipeline never touches the file system after this stage. PDF bytes are
//! handed to pdfium from memory, so a downloaded document needs no temp file.
//! Media type is decided here once, from magic bytes first and the filename
//! extension second, and everything downstream dispatches on it.

use crate::error::QuizError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kinds of document the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MediaType {
    Pdf,
    PlainText,
    /// PNG or JPEG; goes straight to OCR.
    Image,
}

/// An uploaded document. Lives only for the duration of one request.
#[derive(Clone)]
pub struct Document {
    bytes: Vec<u8>,
    filename: String,
    media_type: MediaType,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap raw bytes, detecting the media type.
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Result<Self, QuizError> {
        let filename = filename.into();
        let media_type = detect_media_type(&bytes, &filename).ok_or_else(|| {
            QuizError::UnsupportedDocument {
                filename: filename.clone(),
                detail: if bytes.is_empty() {
                    "the file is empty".to_string()
                } else {
                    format!(
                        "expected a PDF, PNG, JPEG, or UTF-8 text file; first bytes: {:?}",
                        &bytes[..bytes.len().min(4)]
                    )
                },
            }
        })?;
        Ok(Self {
            bytes,
            filename,
            media_type,
        })
    }

    /// Wrap raw bytes with a declared media type, skipping detection.
    pub fn with_media_type(
        bytes: Vec<u8>,
        filename: impl Into<String>,
        media_type: MediaType,
    ) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            media_type,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Decide the media type from magic bytes, then from the extension.
pub fn detect_media_type(bytes: &[u8], filename: &str) -> Option<MediaType> {
    if bytes.is_empty() {
        return None;
    }
    if bytes.starts_with(b"%PDF") {
        return Some(MediaType::Pdf);
    }
    if bytes.starts_with(PNG_MAGIC) || bytes.starts_with(JPEG_MAGIC) {
        return Some(MediaType::Image);
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") | Some("md") | Some("markdown") | Some("text") => Some(MediaType::PlainText),
        // Extension-less text is accepted when it decodes cleanly.
        None if std::str::from_utf8(bytes).is_ok() => Some(MediaType::PlainText),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL into a [`Document`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, QuizError> {
    if input.trim().is_empty() {
        return Err(QuizError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping I/O failures onto input errors.
async fn read_local(path_str: &str) -> Result<Document, QuizError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QuizError::PermissionDenied { path });
        }
        Err(_) => return Err(QuizError::FileNotFound { path }),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
    Document::new(bytes, filename)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, QuizError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QuizError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            QuizError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            QuizError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(QuizError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            QuizError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            QuizError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Document::new(bytes.to_vec(), filename_from_url(url))
}

/// Extract a reasonable filename from the URL path.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
