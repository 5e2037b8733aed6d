//! Search Engine: three retrieval strategies merged into one result list.
//!
//! | Strategy | Store call | On failure |
//! |----------|------------|------------|
//! | name | [`IndexStore::find_by_name_pattern`] | search fails |
//! | full-text | [`IndexStore::find_by_content_pattern`] + id resolution | search fails |
//! | semantic | embed query + [`IndexStore::find_by_semantic_similarity`] | yields nothing |
//!
//! The strategies run concurrently. Their union is deduplicated by document
//! id and ordered by `last_modified` descending, then id ascending.
//! Similarity scores only decide which documents the semantic strategy
//! contributes (top `semantic_top_k` at or above `min_similarity`); they do
//! not affect the final order.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{SearchError, SemanticUnavailable, StoreError};
use crate::models::{normalize_extensions, Document};
use crate::store::IndexStore;

pub struct SearchEngine {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Search by name, content, and meaning.
    ///
    /// `extensions` restricts results to documents with one of the given
    /// extensions (case and leading dots ignored); empty means all. A blank
    /// query returns no results. Leading and trailing whitespace in the
    /// query is ignored.
    pub async fn search(
        &self,
        query: &str,
        extensions: &[String],
    ) -> Result<Vec<Document>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let filter = normalize_extensions(extensions);

        let (by_name, by_content, by_meaning) = tokio::join!(
            self.store.find_by_name_pattern(query, &filter),
            self.content_matches(query, &filter),
            self.semantic_matches(query, &filter),
        );

        let mut merged: HashMap<String, Document> = HashMap::new();
        for doc in by_name?
            .into_iter()
            .chain(by_content?)
            .chain(by_meaning)
        {
            merged.entry(doc.id.clone()).or_insert(doc);
        }

        let mut results: Vec<Document> = merged.into_values().collect();
        results.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(results)
    }

    /// [`search`](Self::search), abandoned as soon as `cancel` fires.
    pub async fn search_with_cancel(
        &self,
        query: &str,
        extensions: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Document>, SearchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SearchError::Cancelled),
            result = self.search(query, extensions) => result,
        }
    }

    async fn content_matches(
        &self,
        query: &str,
        filter: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let ids = self.store.find_by_content_pattern(query, filter).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.get_documents(&ids).await
    }

    async fn semantic_matches(&self, query: &str, filter: &[String]) -> Vec<Document> {
        match self.try_semantic(query, filter).await {
            Ok(docs) => docs,
            Err(e) => {
                debug!(error = %e, "searching by name and content only");
                Vec::new()
            }
        }
    }

    async fn try_semantic(
        &self,
        query: &str,
        filter: &[String],
    ) -> Result<Vec<Document>, SemanticUnavailable> {
        let query_vec = self.embedder.embed(query).await?;
        let hits = self
            .store
            .find_by_semantic_similarity(&query_vec, filter, self.config.semantic_top_k)
            .await?;

        let ids: Vec<String> = hits
            .into_iter()
            .filter(|(_, score)| *score >= self.config.min_similarity)
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.get_documents(&ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledProvider, HashProvider};
    use crate::error::EmbedError;
    use crate::models::{document_id_for_path, NewIndexEntry};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    /// Maps known words to fixed unit vectors.
    struct Lookup;

    #[async_trait]
    impl EmbeddingProvider for Lookup {
        fn model_name(&self) -> &str {
            "lookup"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            texts
                .iter()
                .map(|t| match t.as_str() {
                    "money" | "bill" => Ok(vec![1.0, 0.0]),
                    "weather" => Ok(vec![0.0, 1.0]),
                    other => Err(EmbedError::Failed(format!("unknown word {}", other))),
                })
                .collect()
        }
    }

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

    async fn seeded(embedder: Arc<dyn EmbeddingProvider>) -> SearchEngine {
        let store = Arc::new(InMemoryStore::new());
        store
            .index_document(
                &doc("/d/invoice.txt", 10),
                &[NewIndexEntry::text("invoice for march")],
            )
            .await
            .unwrap();
        store
            .index_document(
                &doc("/d/report.pdf", 30),
                &[NewIndexEntry {
                    content: "the quarterly invoice total".into(),
                    page_number: Some(1),
                    embedding: Some(vec![0.0, 1.0]),
                }],
            )
            .await
            .unwrap();
        store
            .index_document(
                &doc("/d/receipt.txt", 20),
                &[NewIndexEntry {
                    content: "paid in cash".into(),
                    page_number: None,
                    embedding: Some(vec![1.0, 0.0]),
                }],
            )
            .await
            .unwrap();
        SearchEngine::new(store, embedder, SearchConfig::default())
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.file_name.as_str()).collect()
    }

    #[tokio::test]
    async fn name_and_content_matches_are_merged_once() {
        let engine = seeded(Arc::new(DisabledProvider)).await;
        let results = engine.search("invoice", &[]).await.unwrap();
        // invoice.txt matches by name and content but appears once.
        assert_eq!(names(&results), vec!["report.pdf", "invoice.txt"]);
    }

    #[tokio::test]
    async fn extension_filter_narrows_results() {
        let engine = seeded(Arc::new(DisabledProvider)).await;
        let all = engine.search("invoice", &[]).await.unwrap();
        let pdf = engine.search("invoice", &[".PDF".to_string()]).await.unwrap();
        assert_eq!(names(&pdf), vec!["report.pdf"]);
        assert!(pdf.iter().all(|d| all.iter().any(|a| a.id == d.id)));
    }

    #[tokio::test]
    async fn semantic_strategy_contributes_above_threshold() {
        let engine = seeded(Arc::new(Lookup)).await;
        let results = engine.search("bill", &[]).await.unwrap();
        assert_eq!(names(&results), vec!["receipt.txt"]);
    }

    #[tokio::test]
    async fn semantic_failure_degrades_to_other_strategies() {
        let engine = seeded(Arc::new(Lookup)).await;
        // "invoice" is unknown to the embedder.
        let results = engine.search("invoice", &[]).await.unwrap();
        assert_eq!(names(&results), vec!["report.pdf", "invoice.txt"]);
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let engine = seeded(Arc::new(HashProvider::new(64, 1000))).await;
        assert!(engine.search("zebra-crossing", &[]).await.unwrap().is_empty());
        assert!(engine.search("   ", &[]).await.unwrap().is_empty());
    }

    /// Never answers within a test's lifetime.
    struct Stalled;

    #[async_trait]
    impl EmbeddingProvider for Stalled {
        fn model_name(&self) -> &str {
            "stalled"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Err(EmbedError::Failed("timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn search_cancelled_while_strategies_run() {
        let engine = seeded(Arc::new(Stalled)).await;
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = engine
            .search_with_cancel("invoice", &[], &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));
        assert!(started.elapsed() < std::time::Duration::from_secs(30));
    }

    #[tokio::test]
    async fn cancelled_search_returns_no_result() {
        let engine = seeded(Arc::new(DisabledProvider)).await;
        let token = CancellationToken::new();
        token.cancel();
        let err = engine
            .search_with_cancel("invoice", &[], &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));
    }
}
