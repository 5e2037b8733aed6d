//! Content Extractor: turns a file into plain-text units.
//!
//! Dispatch is by the media type stored on the document (see
//! [`crate::classify`]):
//!
//! | Kind | Sub-extractor | Units |
//! |------|---------------|-------|
//! | image | [`ocr`] (tesseract) | one, no page number |
//! | office | [`ooxml`] | per slide / per sheet / whole document |
//! | PDF | `pdf-extract` | one per page, 1-based |
//! | binary (audio, video, archives) | none | none; indexed by name only |
//! | text | UTF-8 decode | one, whole content |
//!
//! Units whose text is blank are dropped, so an empty file yields no units.
//! Parsing runs on the blocking pool; OCR runs as a child process.

pub mod ocr;
pub mod ooxml;

use async_trait::async_trait;
use std::path::Path;

use crate::classify::{media_kind, MediaKind};
use crate::config::OcrConfig;
use crate::error::ExtractError;
use crate::models::ExtractedUnit;

/// Produces the text units of one file.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<Vec<ExtractedUnit>, ExtractError>;
}

/// The production extractor covering every supported format.
pub struct FormatExtractor {
    ocr: OcrConfig,
}

impl FormatExtractor {
    pub fn new(ocr: OcrConfig) -> Self {
        Self { ocr }
    }
}

#[async_trait]
impl ContentExtractor for FormatExtractor {
    async fn extract(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<Vec<ExtractedUnit>, ExtractError> {
        let units = match media_kind(mime_type) {
            MediaKind::Image => {
                let text = ocr::recognize(&self.ocr, path).await?;
                vec![ExtractedUnit::whole(text.trim())]
            }
            MediaKind::Office => {
                let bytes = read_bytes(path).await?;
                let mime = mime_type.to_string();
                run_blocking(path, move || {
                    ooxml::extract_office(&bytes, &mime).map_err(|e| e.to_string())
                })
                .await?
            }
            MediaKind::Pdf => {
                let bytes = read_bytes(path).await?;
                let pages = run_blocking(path, move || {
                    pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| e.to_string())
                })
                .await?;
                pages
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| ExtractedUnit::page(text, i as u32 + 1))
                    .collect()
            }
            MediaKind::Binary => Vec::new(),
            MediaKind::Text => {
                let bytes = read_bytes(path).await?;
                vec![ExtractedUnit::whole(decode_text(path, bytes)?)]
            }
        };

        Ok(units
            .into_iter()
            .filter(|u| !u.text.trim().is_empty())
            .collect())
    }
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ExtractError::failed(path, e))
}

/// Run a CPU-bound parser off the async workers.
async fn run_blocking<T, F>(path: &Path, f: F) -> Result<T, ExtractError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractError::failed(path, e))?
        .map_err(|cause| ExtractError::failed(path, cause))
}

/// Strict UTF-8, with a leading byte-order mark removed.
fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String, ExtractError> {
    let mut text = String::from_utf8(bytes)
        .map_err(|_| ExtractError::failed(path, "content is not valid UTF-8"))?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}
