//! Media-type classification.
//!
//! The crawler stores a media type on every [`Document`](crate::models::Document)
//! and the extractor dispatches on it. Types come from `mime_guess` by file
//! extension; anything it cannot name is treated as plain text. Binary media
//! types get no extractor and are indexed by name only.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_ODT: &str = "application/vnd.oasis.opendocument.text";
pub const MIME_TEXT: &str = "text/plain";

/// Which sub-extractor handles a media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Raster images, read with OCR.
    Image,
    /// Zip-packaged office documents.
    Office,
    Pdf,
    /// Audio, video, fonts, archives and executables. Indexed by name only.
    Binary,
    /// Everything else, decoded as UTF-8.
    Text,
}

/// `application/*` types that carry no readable text.
const BINARY_APPLICATION_TYPES: &[&str] = &[
    "application/octet-stream",
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/x-tar",
    "application/x-bzip",
    "application/x-bzip2",
    "application/x-xz",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "application/vnd.rar",
    "application/java-archive",
    "application/wasm",
    "application/x-msdownload",
    "application/x-msdos-program",
    "application/x-executable",
    "application/x-sharedlib",
    "application/x-apple-diskimage",
    "application/x-iso9660-image",
    "application/vnd.sqlite3",
    "application/x-sqlite3",
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
];

/// Classify a file by its name. Never fails.
pub fn classify(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    // Office formats are pinned so classification does not depend on the
    // mime_guess table version.
    match ext.as_str() {
        "pdf" => return MIME_PDF.to_string(),
        "docx" => return MIME_DOCX.to_string(),
        "pptx" => return MIME_PPTX.to_string(),
        "xlsx" => return MIME_XLSX.to_string(),
        "odt" => return MIME_ODT.to_string(),
        "" => return MIME_TEXT.to_string(),
        _ => {}
    }

    mime_guess::from_ext(&ext)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| MIME_TEXT.to_string())
}

/// Map a stored media type to the sub-extractor that reads it.
pub fn media_kind(mime_type: &str) -> MediaKind {
    match mime_type {
        MIME_PDF => MediaKind::Pdf,
        MIME_DOCX | MIME_PPTX | MIME_XLSX | MIME_ODT => MediaKind::Office,
        // Vector images have no pixels to OCR; their XML is text.
        "image/svg+xml" => MediaKind::Text,
        m if m.starts_with("image/") => MediaKind::Image,
        m if m.starts_with("audio/") || m.starts_with("video/") || m.starts_with("font/") => {
            MediaKind::Binary
        }
        m if BINARY_APPLICATION_TYPES.contains(&m) => MediaKind::Binary,
        _ => MediaKind::Text,
    }
}
