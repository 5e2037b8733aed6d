//! SQLite-backed [`IndexStore`] implementation.
//!
//! Documents and index entries live in two tables joined by a cascading
//! foreign key (see [`crate::migrate`]). Entry replacement runs inside a
//! transaction, so a crash or error mid-write rolls back to the previous
//! content version. Embeddings are stored as little-endian `f32` BLOBs and
//! scored in Rust.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::path::Path;
use tokio::sync::broadcast;

use super::{rank_by_similarity, ChangeFeed, IndexStore, StoreChange, StoreStats};
use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::StoreError;
use crate::migrate;
use crate::models::{file_extension, Document, IndexEntry, NewIndexEntry};

const DOCUMENT_COLUMNS: &str =
    "id, file_name, file_path, mime_type, size, last_modified, indexed_at";

/// Keeps `IN (...)` lists under SQLite's bound-parameter limit.
const ID_BATCH: usize = 500;

/// SQLite implementation of [`IndexStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    changes: ChangeFeed,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: ChangeFeed::new(),
        }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        Self::open_path(&config.db.path).await
    }

    pub async fn open_path(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        mime_type: row.get("mime_type"),
        size: row.get("size"),
        last_modified: row.get("last_modified"),
        indexed_at: row.get("indexed_at"),
    }
}

fn row_to_entry(row: &SqliteRow) -> IndexEntry {
    let page_number: Option<i64> = row.get("page_number");
    let embedding: Option<Vec<u8>> = row.get("embedding");
    IndexEntry {
        id: row.get("id"),
        document_id: row.get("document_id"),
        content: row.get("content"),
        page_number: page_number.map(|p| p as u32),
        embedding: embedding.map(|b| blob_to_vec(&b)),
    }
}

fn push_extension_filter(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, extensions: &[String]) {
    if extensions.is_empty() {
        return;
    }
    qb.push(" AND ");
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for ext in extensions {
        separated.push_bind(ext.clone());
    }
    separated.push_unseparated(")");
}

async fn write_document(conn: &mut SqliteConnection, doc: &Document) -> Result<(), sqlx::Error> {
    // ON CONFLICT DO UPDATE rather than INSERT OR REPLACE: a REPLACE would
    // delete the row first and cascade away its entries.
    sqlx::query(
        r#"
        INSERT INTO documents (id, file_name, file_path, extension, mime_type, size,
                               last_modified, indexed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            file_name = excluded.file_name,
            file_path = excluded.file_path,
            extension = excluded.extension,
            mime_type = excluded.mime_type,
            size = excluded.size,
            last_modified = excluded.last_modified,
            indexed_at = excluded.indexed_at
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.file_name)
    .bind(&doc.file_path)
    .bind(file_extension(&doc.file_name))
    .bind(&doc.mime_type)
    .bind(doc.size)
    .bind(doc.last_modified)
    .bind(doc.indexed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn delete_entries(conn: &mut SqliteConnection, document_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM index_entries WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_entries(
    conn: &mut SqliteConnection,
    document_id: &str,
    entries: &[NewIndexEntry],
) -> Result<(), sqlx::Error> {
    for entry in entries {
        let blob = entry.embedding.as_deref().map(vec_to_blob);
        sqlx::query(
            "INSERT INTO index_entries (document_id, content, page_number, embedding) VALUES (?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(&entry.content)
        .bind(entry.page_number.map(i64::from))
        .bind(blob)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn upsert_document(&self, doc: &Document) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;
        write_document(&mut conn, doc)
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;

        self.changes.publish(StoreChange::Indexed {
            document_id: doc.id.clone(),
        });
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::write(id, e))?;

        let removed = result.rows_affected() > 0;
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
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::write(document_id, e))?;

        // Write first: a deferred transaction that reads before its first
        // write can fail with SQLITE_BUSY_SNAPSHOT under a concurrent writer.
        delete_entries(&mut tx, document_id)
            .await
            .map_err(|e| StoreError::write(document_id, e))?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::write(document_id, e))?;
        if exists == 0 {
            return Err(StoreError::write(document_id, "document not found"));
        }

        insert_entries(&mut tx, document_id, entries)
            .await
            .map_err(|e| StoreError::write(document_id, e))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::write(document_id, e))?;

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
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;

        write_document(&mut tx, doc)
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;
        delete_entries(&mut tx, &doc.id)
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;
        insert_entries(&mut tx, &doc.id, entries)
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::write(&doc.id, e))?;

        self.changes.publish(StoreChange::Indexed {
            document_id: doc.id.clone(),
        });
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::read)?;

        Ok(row.as_ref().map(row_to_document))
    }

    async fn get_documents(&self, ids: &[String]) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::with_capacity(ids.len());
        for batch in ids.chunks(ID_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM documents WHERE id IN (",
                DOCUMENT_COLUMNS
            ));
            let mut separated = qb.separated(", ");
            for id in batch {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            let rows = qb
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::read)?;
            docs.extend(rows.iter().map(row_to_document));
        }
        Ok(docs)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY file_path ASC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::read)?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn get_entries_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, document_id, content, page_number, embedding FROM index_entries WHERE document_id = ? ORDER BY id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::read)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn entry_count(&self, document_id: &str) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM index_entries WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::read)
    }

    async fn list_extensions(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar("SELECT DISTINCT extension FROM documents ORDER BY extension ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::read)
    }

    async fn find_by_media_type(&self, prefix: &str) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE instr(mime_type, ?) = 1 ORDER BY file_path ASC",
            DOCUMENT_COLUMNS
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::read)?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn find_by_name_pattern(
        &self,
        pattern: &str,
        extensions: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM documents WHERE instr(lower(file_name), lower(",
            DOCUMENT_COLUMNS
        ));
        qb.push_bind(pattern.to_string());
        qb.push(")) > 0");
        push_extension_filter(&mut qb, "extension", extensions);
        qb.push(" ORDER BY last_modified DESC, id ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::read)?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn find_by_content_pattern(
        &self,
        pattern: &str,
        extensions: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT e.document_id FROM index_entries e \
             JOIN documents d ON d.id = e.document_id \
             WHERE instr(lower(e.content), lower(",
        );
        qb.push_bind(pattern.to_string());
        qb.push(")) > 0");
        push_extension_filter(&mut qb, "d.extension", extensions);
        qb.push(" ORDER BY e.document_id ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::read)?;

        Ok(rows.iter().map(|r| r.get("document_id")).collect())
    }

    async fn find_by_semantic_similarity(
        &self,
        query_vec: &[f32],
        extensions: &[String],
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT e.document_id, e.embedding FROM index_entries e \
             JOIN documents d ON d.id = e.document_id \
             WHERE e.embedding IS NOT NULL",
        );
        push_extension_filter(&mut qb, "d.extension", extensions);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::read)?;

        let vectors: Vec<(String, Vec<f32>)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (row.get("document_id"), blob_to_vec(&blob))
            })
            .collect();

        Ok(rank_by_similarity(
            query_vec,
            vectors.iter().map(|(id, v)| (id.as_str(), v.as_slice())),
            top_k,
        ))
    }

    async fn find_matching_entries(
        &self,
        document_ids: &[String],
        pattern: &str,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        let mut entries = Vec::new();
        for batch in document_ids.chunks(ID_BATCH) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT id, document_id, content, page_number, embedding FROM index_entries \
                 WHERE instr(lower(content), lower(",
            );
            qb.push_bind(pattern.to_string());
            qb.push(")) > 0 AND document_id IN (");
            let mut separated = qb.separated(", ");
            for id in batch {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            let rows = qb
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::read)?;
            entries.extend(rows.iter().map(row_to_entry));
        }
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::read)?;
        let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::read)?;
        let embedded_entries: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM index_entries WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::read)?;

        Ok(StoreStats {
            documents,
            entries,
            embedded_entries,
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
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open_path(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    fn doc(path: &str, last_modified: i64) -> Document {
        let file_name = path.rsplit('/').next().unwrap().to_string();
        Document {
            id: document_id_for_path(path),
            file_name,
            file_path: path.to_string(),
            mime_type: "text/plain".to_string(),
            size: 12,
            last_modified,
            indexed_at: 0,
        }
    }

    fn entry(content: &str, embedding: Option<Vec<f32>>) -> NewIndexEntry {
        NewIndexEntry {
            content: content.to_string(),
            page_number: None,
            embedding,
        }
    }

    #[tokio::test]
    async fn matching_entries_show_where_a_hit_is() {
        let (_tmp, store) = open_temp().await;
        let report = doc("/docs/report.pdf", 1);
        let other = doc("/docs/other.pdf", 2);
        let page = |content: &str, n: u32| NewIndexEntry {
            content: content.to_string(),
            page_number: Some(n),
            embedding: None,
        };
        store
            .index_document(
                &report,
                &[page("summary", 1), page("Invoice total", 2), page("invoice terms", 3)],
            )
            .await
            .unwrap();
        store
            .index_document(&other, &[page("invoice copy", 1)])
            .await
            .unwrap();

        let hits = store
            .find_matching_entries(&[report.id.clone()], "INVOICE")
            .await
            .unwrap();
        let pages: Vec<Option<u32>> = hits.iter().map(|e| e.page_number).collect();
        assert_eq!(pages, vec![Some(2), Some(3)]);
        assert!(hits.iter().all(|e| e.document_id == report.id));

        assert!(store
            .find_matching_entries(&[], "invoice")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_replaces_all_commit() {
        let (_tmp, store) = open_temp().await;
        let store = std::sync::Arc::new(store);
        let mut ids = Vec::new();
        for i in 0..8 {
            let d = doc(&format!("/docs/{}.txt", i), i);
            store.upsert_document(&d).await.unwrap();
            ids.push(d.id);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids.clone() {
            let store = store.clone();
            tasks.spawn(async move {
                for round in 0..5 {
                    store
                        .replace_index_entries(&id, &[entry(&format!("round {}", round), None)])
                        .await
                        .unwrap();
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        for id in &ids {
            let entries = store.get_entries_for_document(id).await.unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].content, "round 4");
        }
    }

    #[tokio::test]
    async fn replace_is_not_accumulate() {
        let (_tmp, store) = open_temp().await;
        let d = doc("/docs/a.txt", 1);
        store.upsert_document(&d).await.unwrap();

        store
            .replace_index_entries(&d.id, &[entry("first", None), entry("second", None)])
            .await
            .unwrap();
        store
            .replace_index_entries(&d.id, &[entry("third", None)])
            .await
            .unwrap();

        let entries = store.get_entries_for_document(&d.id).await.unwrap();
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["third"]);
    }

    #[tokio::test]
    async fn entry_ids_keep_increasing() {
        let (_tmp, store) = open_temp().await;
        let d = doc("/docs/a.txt", 1);
        store.upsert_document(&d).await.unwrap();

        store
            .replace_index_entries(&d.id, &[entry("one", None)])
            .await
            .unwrap();
        let first = store.get_entries_for_document(&d.id).await.unwrap()[0].id;
        store
            .replace_index_entries(&d.id, &[entry("two", None)])
            .await
            .unwrap();
        let second = store.get_entries_for_document(&d.id).await.unwrap()[0].id;
        assert!(second > first);
    }

    #[tokio::test]
    async fn upsert_keeps_existing_entries() {
        let (_tmp, store) = open_temp().await;
        let mut d = doc("/docs/a.txt", 1);
        store.index_document(&d, &[entry("kept", None)]).await.unwrap();

        d.indexed_at = 99;
        store.upsert_document(&d).await.unwrap();

        assert_eq!(store.entry_count(&d.id).await.unwrap(), 1);
        assert_eq!(store.get_document(&d.id).await.unwrap().unwrap().indexed_at, 99);
    }

    #[tokio::test]
    async fn delete_cascades_entries() {
        let (_tmp, store) = open_temp().await;
        let a = doc("/docs/a.txt", 1);
        let b = doc("/docs/b.txt", 1);
        store.index_document(&a, &[entry("alpha", None)]).await.unwrap();
        store.index_document(&b, &[entry("beta", None)]).await.unwrap();

        assert!(store.delete_document(&a.id).await.unwrap());
        assert!(!store.delete_document(&a.id).await.unwrap());

        assert!(store.get_document(&a.id).await.unwrap().is_none());
        assert_eq!(store.entry_count(&a.id).await.unwrap(), 0);
        assert_eq!(store.entry_count(&b.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_for_missing_document_fails() {
        let (_tmp, store) = open_temp().await;
        let err = store
            .replace_index_entries("nope", &[entry("x", None)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn name_pattern_with_extension_filter() {
        let (_tmp, store) = open_temp().await;
        store.upsert_document(&doc("/d/Invoice.pdf", 1)).await.unwrap();
        store.upsert_document(&doc("/d/invoice.txt", 2)).await.unwrap();
        store.upsert_document(&doc("/d/other.pdf", 3)).await.unwrap();

        let all = store.find_by_name_pattern("INVOICE", &[]).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first.
        assert_eq!(all[0].file_name, "invoice.txt");

        let pdf = store
            .find_by_name_pattern("invoice", &["pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(pdf.len(), 1);
        assert_eq!(pdf[0].file_name, "Invoice.pdf");
    }

    #[tokio::test]
    async fn content_pattern_returns_distinct_ids() {
        let (_tmp, store) = open_temp().await;
        let a = doc("/d/a.pdf", 1);
        let b = doc("/d/b.txt", 1);
        store
            .index_document(&a, &[entry("invoice one", None), entry("invoice two", None)])
            .await
            .unwrap();
        store
            .index_document(&b, &[entry("an invoice", None)])
            .await
            .unwrap();

        let mut ids = store.find_by_content_pattern("Invoice", &[]).await.unwrap();
        ids.sort();
        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);

        let pdf_only = store
            .find_by_content_pattern("invoice", &["pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(pdf_only, vec![a.id.clone()]);
    }

    #[tokio::test]
    async fn semantic_search_skips_entries_without_embedding() {
        let (_tmp, store) = open_temp().await;
        let a = doc("/d/a.txt", 1);
        let b = doc("/d/b.txt", 1);
        store
            .index_document(&a, &[entry("x", Some(vec![1.0, 0.0]))])
            .await
            .unwrap();
        store.index_document(&b, &[entry("y", None)]).await.unwrap();

        let hits = store
            .find_by_semantic_similarity(&[1.0, 0.0], &[], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, a.id);

        let entries = store.get_entries_for_document(&a.id).await.unwrap();
        assert_eq!(entries[0].embedding.as_deref(), Some(&[1.0f32, 0.0][..]));
    }

    #[tokio::test]
    async fn extensions_and_media_type() {
        let (_tmp, store) = open_temp().await;
        let mut img = doc("/d/scan.PNG", 1);
        img.mime_type = "image/png".to_string();
        store.upsert_document(&img).await.unwrap();
        store.upsert_document(&doc("/d/a.txt", 1)).await.unwrap();

        assert_eq!(store.list_extensions().await.unwrap(), vec!["png", "txt"]);
        let images = store.find_by_media_type("image/").await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].file_name, "scan.PNG");
    }

    #[tokio::test]
    async fn change_feed_announces_writes() {
        let (_tmp, store) = open_temp().await;
        let mut rx = store.subscribe();
        let a = doc("/d/a.txt", 1);
        store.index_document(&a, &[]).await.unwrap();
        store.delete_document(&a.id).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            StoreChange::Indexed {
                document_id: a.id.clone()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreChange::Deleted {
                document_id: a.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn stats_counts_rows() {
        let (_tmp, store) = open_temp().await;
        let a = doc("/d/a.txt", 1);
        store
            .index_document(&a, &[entry("x", Some(vec![1.0])), entry("y", None)])
            .await
            .unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            StoreStats {
                documents: 1,
                entries: 2,
                embedded_entries: 1
            }
        );
    }
}
