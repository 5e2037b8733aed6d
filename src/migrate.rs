use anyhow::Result;
use sqlx::SqlitePool;

/// Create the documents and index_entries tables. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            file_path TEXT NOT NULL UNIQUE,
            extension TEXT NOT NULL DEFAULT '',
            mime_type TEXT NOT NULL,
            size INTEGER NOT NULL,
            last_modified INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // AUTOINCREMENT keeps entry ids strictly increasing even after deletes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            content TEXT NOT NULL,
            page_number INTEGER,
            embedding BLOB,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_index_entries_document_id ON index_entries(document_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_extension ON documents(extension)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_last_modified ON documents(last_modified DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
