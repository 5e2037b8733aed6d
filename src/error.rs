//! Error taxonomy for the indexing and search core.
//!
//! Per-file and per-strategy failures are typed so callers can decide what
//! to absorb: the crawler skips files on [`ExtractError`] and
//! [`StoreError::WriteFailed`], stores entries without vectors on
//! [`EmbedError`], and the search engine degrades on semantic failures.
//! [`StoreError::ReadFailed`] is always surfaced.

use std::path::PathBuf;
use thiserror::Error;

/// A sub-extractor could not produce text for a file.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("extraction failed for {path}: {cause}")]
    ExtractionFailed { path: PathBuf, cause: String },

    #[error("unsupported media type for {path}: {mime_type}")]
    UnsupportedMediaType { path: PathBuf, mime_type: String },

    #[error("{path} is {size} bytes, above the {limit} byte extraction limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
}

impl ExtractError {
    pub fn failed(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        ExtractError::ExtractionFailed {
            path: path.into(),
            cause: cause.to_string(),
        }
    }
}

/// The embedding generator could not produce a vector.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error("input too long: {chars} chars, max {max}")]
    InputTooLong { chars: usize, max: usize },

    #[error("embedding failed: {0}")]
    Failed(String),
}

/// Index Store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write for one document was rolled back.
    #[error("store write failed for document {document_id}: {cause}")]
    WriteFailed { document_id: String, cause: String },

    #[error("store read failed: {0}")]
    ReadFailed(String),
}

impl StoreError {
    pub fn write(document_id: &str, cause: impl ToString) -> Self {
        StoreError::WriteFailed {
            document_id: document_id.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn read(cause: impl ToString) -> Self {
        StoreError::ReadFailed(cause.to_string())
    }
}

/// Why the semantic strategy contributed nothing to a search. Never
/// surfaced to the caller of `search`.
#[derive(Error, Debug)]
pub enum SemanticUnavailable {
    #[error("semantic strategy unavailable: {0}")]
    Embed(#[from] EmbedError),

    #[error("semantic strategy unavailable: {0}")]
    Store(#[from] StoreError),
}

/// A search call that produced no result.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}
