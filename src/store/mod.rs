//! Index Store abstraction.
//!
//! The [`IndexStore`] trait is the only shared mutable resource between the
//! crawler (single writer) and the search engine (many readers). Backends:
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | [`SqliteStore`] | [`sqlite`] | Persistent store, WAL + cascading foreign key |
//! | [`InMemoryStore`] | [`memory`] | Tests and ephemeral indexes |
//!
//! Every write that changes what a reader could observe is announced on a
//! broadcast change feed ([`IndexStore::subscribe`]). Observers re-query a
//! snapshot when a [`StoreChange`] arrives; a lagged receiver should simply
//! re-query.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::embedding::cosine_similarity;
use crate::error::StoreError;
use crate::models::{Document, IndexEntry, NewIndexEntry};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// A committed change to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Document row and/or its entries were written.
    Indexed { document_id: String },
    /// Document and its entries were removed.
    Deleted { document_id: String },
}

/// Row counts for `omnizient stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub documents: i64,
    pub entries: i64,
    pub embedded_entries: i64,
}

/// Abstract persistent record store for documents and index entries.
///
/// Extension filters are slices of lowercase extensions without the dot
/// (see [`crate::models::normalize_extensions`]); an empty slice means no
/// restriction. Pattern matching is an ASCII-case-insensitive substring test.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document`](IndexStore::upsert_document) | Insert or fully replace a document row by id |
/// | [`delete_document`](IndexStore::delete_document) | Remove a document and cascade its entries |
/// | [`replace_index_entries`](IndexStore::replace_index_entries) | Atomic delete-all-then-insert of entries |
/// | [`index_document`](IndexStore::index_document) | Upsert + replace in one transaction |
/// | [`find_by_name_pattern`](IndexStore::find_by_name_pattern) | Substring match on file name |
/// | [`find_by_content_pattern`](IndexStore::find_by_content_pattern) | Substring match on entry content |
/// | [`find_by_semantic_similarity`](IndexStore::find_by_semantic_similarity) | Cosine top-K over embeddings |
/// | [`find_matching_entries`](IndexStore::find_matching_entries) | Entries of given documents containing a pattern |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert or fully replace a document row. Existing entries are kept.
    async fn upsert_document(&self, doc: &Document) -> Result<(), StoreError>;

    /// Remove a document and all its entries. Returns whether it existed.
    async fn delete_document(&self, id: &str) -> Result<bool, StoreError>;

    /// Replace every entry of an existing document, all-or-nothing.
    async fn replace_index_entries(
        &self,
        document_id: &str,
        entries: &[NewIndexEntry],
    ) -> Result<(), StoreError>;

    /// Upsert the document row and replace its entries in one transaction.
    async fn index_document(
        &self,
        doc: &Document,
        entries: &[NewIndexEntry],
    ) -> Result<(), StoreError>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Resolve ids to documents; unknown ids are skipped.
    async fn get_documents(&self, ids: &[String]) -> Result<Vec<Document>, StoreError>;

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Entries of one document ordered by id.
    async fn get_entries_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<IndexEntry>, StoreError>;

    async fn entry_count(&self, document_id: &str) -> Result<i64, StoreError>;

    /// Distinct extensions of all stored documents, sorted.
    async fn list_extensions(&self) -> Result<Vec<String>, StoreError>;

    /// Documents whose media type starts with `prefix` (e.g. `"image/"`).
    async fn find_by_media_type(&self, prefix: &str) -> Result<Vec<Document>, StoreError>;

    async fn find_by_name_pattern(
        &self,
        pattern: &str,
        extensions: &[String],
    ) -> Result<Vec<Document>, StoreError>;

    /// Distinct ids of documents with at least one entry containing `pattern`.
    async fn find_by_content_pattern(
        &self,
        pattern: &str,
        extensions: &[String],
    ) -> Result<Vec<String>, StoreError>;

    /// At most `top_k` `(document_id, score)` pairs, best first. A document's
    /// score is the best similarity among its embedded entries.
    async fn find_by_semantic_similarity(
        &self,
        query_vec: &[f32],
        extensions: &[String],
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, StoreError>;

    /// Entries of the given documents whose content contains `pattern`,
    /// ordered by id. Shows where inside each document a query hit.
    async fn find_matching_entries(
        &self,
        document_ids: &[String],
        pattern: &str,
    ) -> Result<Vec<IndexEntry>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Receive a [`StoreChange`] for every committed write from now on.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Broadcast sender shared by the backends.
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<StoreChange>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub(crate) fn publish(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.tx.send(change);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

/// ASCII-case-insensitive substring test, matching SQLite's `lower()`.
pub(crate) fn contains_pattern(haystack: &str, pattern: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&pattern.to_ascii_lowercase())
}

/// Score each embedded entry, keep the best per document, order by score
/// desc then id asc, and truncate to `top_k`.
pub(crate) fn rank_by_similarity<'a, I>(
    query_vec: &[f32],
    vectors: I,
    top_k: usize,
) -> Vec<(String, f32)>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut best: HashMap<&str, f32> = HashMap::new();
    for (document_id, vec) in vectors {
        let sim = cosine_similarity(query_vec, vec);
        best.entry(document_id)
            .and_modify(|s| {
                if sim > *s {
                    *s = sim;
                }
            })
            .or_insert(sim);
    }

    let mut ranked: Vec<(String, f32)> = best
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(top_k);
    ranked
}
