//! In-memory [`IndexStore`] implementation for tests and throwaway indexes.
//!
//! Both tables sit behind a single `std::sync::RwLock`, so every write is
//! atomic with respect to readers. Semantic search is brute-force cosine
//! similarity over all stored vectors.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{contains_pattern, rank_by_similarity, ChangeFeed, IndexStore, StoreChange, StoreStats};
use crate::error::StoreError;
use crate::models::{Document, IndexEntry, NewIndexEntry};

#[derive(Default)]
struct Tables {
    docs: HashMap<String, Document>,
    entries: Vec<IndexEntry>,
    next_entry_id: i64,
}

impl Tables {
    fn replace_entries(&mut self, document_id: &str, entries: &[NewIndexEntry]) {
        self.entries.retain(|e| e.document_id != document_id);
        for entry in entries {
            self.next_entry_id += 1;
            self.entries.push(IndexEntry {
                id: self.next_entry_id,
                document_id: document_id.to_string(),
                content: entry.content.clone(),
                page_number: entry.page_number,
                embedding: entry.embedding.clone(),
            });
        }
    }

    fn extension_allowed(&self, document_id: &str, extensions: &[String]) -> bool {
        if extensions.is_empty() {
            return true;
        }
        self.docs
            .get(document_id)
            .map(|d| extensions.contains(&d.extension()))
            .unwrap_or(false)
    }
}

/// In-memory store.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    changes: ChangeFeed,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            changes: ChangeFeed::new(),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::read("in-memory store lock poisoned"))
    }

    fn write(&self, document_id: &str) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::write(document_id, "in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(docs: &mut [Document]) {
    docs.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn upsert_document(&self, doc: &Document) -> Result<(), StoreError> {
        {
            let mut tables = self.write(&doc.id)?;
            tables.docs.insert(doc.id.clone(), doc.clone());
        }
        self.changes.publish(StoreChange::Indexed {
            document_id: doc.id.clone(),
        });
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let removed = {
            let mut tables = self.write(id)?;
            let removed = tables.docs.remove(id).is_some();
            tables.entries.retain(|e| e.document_id != id);
            removed
        };
        if removed {
            self.changes.publish(StoreChange::Deleted {
                document_id: id.to_string(),
            });
        }
        Ok(removed)
    }

    async fn replace_index_entries(
        &self,
        document_id: &str,
        entries: &[NewIndexEntry],
    ) -> Result<(), StoreError> {
        {
            let mut tables = self.write(document_id)?;
            if !tables.docs.contains_key(document_id) {
                return Err(StoreError::write(document_id, "document not found"));
            }
            tables.replace_entries(document_id, entries);
        }
        self.changes.publish(StoreChange::Indexed {
            document_id: document_id.to_string(),
        });
        Ok(())
    }

    async fn index_document(
        &self,
        doc: &Document,
        entries: &[NewIndexEntry],
    ) -> Result<(), StoreError> {
        {
            let mut tables = self.write(&doc.id)?;
            tables.docs.insert(doc.id.clone(), doc.clone());
            tables.replace_entries(&doc.id, entries);
        }
        self.changes.publish(StoreChange::Indexed {
            document_id: doc.id.clone(),
        });
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.read()?.docs.get(id).cloned())
    }

    async fn get_documents(&self, ids: &[String]) -> Result<Vec<Document>, StoreError> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.docs.get(id).cloned())
            .collect())
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self.read()?.docs.values().cloned().collect();
        docs.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(docs)
    }

    async fn get_entries_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        let tables = self.read()?;
        // Entries are appended with increasing ids, so Vec order is id order.
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn entry_count(&self, document_id: &str) -> Result<i64, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.document_id == document_id)
            .count() as i64)
    }

    async fn list_extensions(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.read()?;
        let mut exts: Vec<String> = tables.docs.values().map(|d| d.extension()).collect();
        exts.sort();
        exts.dedup();
        Ok(exts)
    }

    async fn find_by_media_type(&self, prefix: &str) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .read()?
            .docs
            .values()
            .filter(|d| d.mime_type.starts_with(prefix))
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(docs)
    }

    async fn find_by_name_pattern(
        &self,
        pattern: &str,
        extensions: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .read()?
            .docs
            .values()
            .filter(|d| contains_pattern(&d.file_name, pattern))
            .filter(|d| extensions.is_empty() || extensions.contains(&d.extension()))
            .cloned()
            .collect();
        newest_first(&mut docs);
        Ok(docs)
    }

    async fn find_by_content_pattern(
        &self,
        pattern: &str,
        extensions: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.read()?;
        let mut ids: Vec<String> = tables
            .entries
            .iter()
            .filter(|e| contains_pattern(&e.content, pattern))
            .filter(|e| tables.extension_allowed(&e.document_id, extensions))
            .map(|e| e.document_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn find_by_semantic_similarity(
        &self,
        query_vec: &[f32],
        extensions: &[String],
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, StoreError> {
        let tables = self.read()?;
        let vectors = tables.entries.iter().filter_map(|e| {
            let vec = e.embedding.as_deref()?;
            if tables.extension_allowed(&e.document_id, extensions) {
                Some((e.document_id.as_str(), vec))
            } else {
                None
            }
        });
        Ok(rank_by_similarity(query_vec, vectors, top_k))
    }

    async fn find_matching_entries(
        &self,
        document_ids: &[String],
        pattern: &str,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .entries
            .iter()
            .filter(|e| document_ids.contains(&e.document_id))
            .filter(|e| contains_pattern(&e.content, pattern))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let tables = self.read()?;
        Ok(StoreStats {
            documents: tables.docs.len() as i64,
            entries: tables.entries.len() as i64,
            embedded_entries: tables
                .entries
                .iter()
                .filter(|e| e.embedding.is_some())
                .count() as i64,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document_id_for_path;

    fn doc(path: &str, last_modified: i64) -> Document {
        Document {
            id: document_id_for_path(path),
            file_name: path.rsplit('/').next().unwrap().to_string(),
            file_path: path.to_string(),
            mime_type: "text/plain".to_string(),
            size: 1,
            last_modified,
            indexed_at: 0,
        }
    }

    #[tokio::test]
    async fn replace_then_delete() {
        let store = InMemoryStore::new();
        let d = doc("/a/notes.txt", 1);
        store.upsert_document(&d).await.unwrap();
        store
            .replace_index_entries(&d.id, &[NewIndexEntry::text("one"), NewIndexEntry::text("two")])
            .await
            .unwrap();
        store
            .replace_index_entries(&d.id, &[NewIndexEntry::text("three")])
            .await
            .unwrap();

        let entries = store.get_entries_for_document(&d.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "three");
        assert_eq!(entries[0].id, 3);

        assert!(store.delete_document(&d.id).await.unwrap());
        assert_eq!(store.entry_count(&d.id).await.unwrap(), 0);
        assert!(store.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn matching_entries_are_limited_to_given_documents() {
        let store = InMemoryStore::new();
        let deck = doc("/a/deck.pptx", 1);
        let memo = doc("/a/memo.txt", 2);
        let slide = |content: &str, n: u32| NewIndexEntry {
            content: content.to_string(),
            page_number: Some(n),
            embedding: None,
        };
        store
            .index_document(&deck, &[slide("Roadmap", 1), slide("agenda", 2), slide("roadmap q3", 3)])
            .await
            .unwrap();
        store
            .index_document(&memo, &[NewIndexEntry::text("roadmap notes")])
            .await
            .unwrap();

        let hits = store
            .find_matching_entries(&[deck.id.clone()], "roadmap")
            .await
            .unwrap();
        let pages: Vec<Option<u32>> = hits.iter().map(|e| e.page_number).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);

        let both = store
            .find_matching_entries(&[deck.id.clone(), memo.id.clone()], "roadmap")
            .await
            .unwrap();
        assert_eq!(both.len(), 3);
    }

    #[tokio::test]
    async fn replace_requires_document() {
        let store = InMemoryStore::new();
        let err = store
            .replace_index_entries("missing", &[NewIndexEntry::text("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));
        assert_eq!(store.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn content_pattern_respects_extension_filter() {
        let store = InMemoryStore::new();
        let pdf = doc("/a/report.pdf", 1);
        let txt = doc("/a/report.txt", 2);
        store
            .index_document(&pdf, &[NewIndexEntry::text("Quarterly Invoice")])
            .await
            .unwrap();
        store
            .index_document(&txt, &[NewIndexEntry::text("invoice"), NewIndexEntry::text("INVOICE")])
            .await
            .unwrap();

        let all = store.find_by_content_pattern("invoice", &[]).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_txt = store
            .find_by_content_pattern("invoice", &["txt".to_string()])
            .await
            .unwrap();
        assert_eq!(only_txt, vec![txt.id.clone()]);
    }

    #[tokio::test]
    async fn name_pattern_orders_newest_first() {
        let store = InMemoryStore::new();
        store.upsert_document(&doc("/a/plan-old.md", 1)).await.unwrap();
        store.upsert_document(&doc("/a/plan-new.md", 5)).await.unwrap();
        let found = store.find_by_name_pattern("PLAN", &[]).await.unwrap();
        let names: Vec<&str> = found.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["plan-new.md", "plan-old.md"]);
    }

    #[tokio::test]
    async fn semantic_uses_best_entry() {
        let store = InMemoryStore::new();
        let a = doc("/a/a.txt", 1);
        let b = doc("/a/b.md", 1);
        store
            .index_document(
                &a,
                &[
                    NewIndexEntry {
                        content: "x".into(),
                        page_number: Some(1),
                        embedding: Some(vec![0.0, 1.0]),
                    },
                    NewIndexEntry {
                        content: "y".into(),
                        page_number: Some(2),
                        embedding: Some(vec![1.0, 0.0]),
                    },
                ],
            )
            .await
            .unwrap();
        store
            .index_document(
                &b,
                &[NewIndexEntry {
                    content: "z".into(),
                    page_number: None,
                    embedding: Some(vec![1.0, 1.0]),
                }],
            )
            .await
            .unwrap();

        let hits = store
            .find_by_semantic_similarity(&[1.0, 0.0], &[], 5)
            .await
            .unwrap();
        assert_eq!(hits[0].0, a.id);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);

        let md_only = store
            .find_by_semantic_similarity(&[1.0, 0.0], &["md".to_string()], 5)
            .await
            .unwrap();
        assert_eq!(md_only.len(), 1);
        assert_eq!(md_only[0].0, b.id);
    }
}
