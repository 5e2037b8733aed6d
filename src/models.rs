//! Core data models for the index.
//!
//! A [`Document`] is one observed file; its extracted content lives in zero
//! or more [`IndexEntry`] rows, one per page, slide, sheet, or whole-file blob.

use sha2::{Digest, Sha256};

/// One indexed file's metadata record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Stable id, a pure function of `file_path` (see [`document_id_for_path`]).
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub mime_type: String,
    /// Byte length at last observation.
    pub size: i64,
    /// Modification time at last observation, epoch milliseconds.
    pub last_modified: i64,
    /// When the entries were last rebuilt, epoch milliseconds.
    pub indexed_at: i64,
}

impl Document {
    /// Lowercased text after the final `.` of the file name.
    pub fn extension(&self) -> String {
        file_extension(&self.file_name)
    }

    /// True when the stored observation matches the file on disk.
    pub fn is_unchanged(&self, size: i64, last_modified: i64) -> bool {
        self.size == size && self.last_modified == last_modified
    }
}

/// A stored unit of extracted content.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Auto-assigned, increasing per store.
    pub id: i64,
    pub document_id: String,
    pub content: String,
    pub page_number: Option<u32>,
    pub embedding: Option<Vec<f32>>,
}

/// An entry about to be written; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIndexEntry {
    pub content: String,
    pub page_number: Option<u32>,
    pub embedding: Option<Vec<f32>>,
}

impl NewIndexEntry {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            page_number: None,
            embedding: None,
        }
    }
}

/// One unit produced by the content extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedUnit {
    pub text: String,
    /// 1-based page, slide, or sheet index for paginated formats.
    pub page_number: Option<u32>,
}

impl ExtractedUnit {
    pub fn whole(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_number: None,
        }
    }

    pub fn page(text: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            page_number: Some(page_number),
        }
    }
}

/// Derive the document id from a canonical path: hex SHA-256, first 32 chars.
pub fn document_id_for_path(file_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}

/// Extension of a file name: text after the final `.`, ASCII-lowercased.
/// Names without a dot have the empty extension.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(pos) => file_name[pos + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Normalize a caller-supplied extension filter: trim, drop leading dots,
/// lowercase, discard empties.
pub fn normalize_extensions(filter: &[String]) -> Vec<String> {
    let mut out: Vec<String> = filter
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_for_path() {
        let a = document_id_for_path("/docs/notes.txt");
        let b = document_id_for_path("/docs/notes.txt");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, document_id_for_path("/docs/other.txt"));
    }

    #[test]
    fn extension_uses_final_dot() {
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("Report.PDF"), "pdf");
        assert_eq!(file_extension("Makefile"), "");
        assert_eq!(file_extension("trailing."), "");
    }

    #[test]
    fn normalize_strips_dots_and_case() {
        let f = normalize_extensions(&[
            ".PDF".to_string(),
            "txt".to_string(),
            " ".to_string(),
            "pdf".to_string(),
        ]);
        assert_eq!(f, vec!["pdf", "txt"]);
    }

    #[test]
    fn unchanged_compares_size_and_mtime() {
        let doc = Document {
            id: "x".into(),
            file_name: "a.txt".into(),
            file_path: "/a.txt".into(),
            mime_type: "text/plain".into(),
            size: 10,
            last_modified: 1000,
            indexed_at: 2000,
        };
        assert!(doc.is_unchanged(10, 1000));
        assert!(!doc.is_unchanged(11, 1000));
        assert!(!doc.is_unchanged(10, 1001));
    }
}
