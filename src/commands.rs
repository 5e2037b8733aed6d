//! CLI command implementations.
//!
//! Each `run_*` function opens the configured store, does one job, and
//! prints a human-readable summary to stdout. Diagnostics go through
//! `tracing` to stderr.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawler::Crawler;
use crate::embedding::create_provider;
use crate::extract::FormatExtractor;
use crate::models::IndexEntry;
use crate::search::SearchEngine;
use crate::server;
use crate::store::{IndexStore, SqliteStore};

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(config).await?))
}

/// Build a search engine over the configured store and embedding provider.
pub async fn build_engine(config: &Config) -> Result<SearchEngine> {
    let store = open_store(config).await?;
    let embedder = create_provider(&config.embedding)?;
    Ok(SearchEngine::new(store, embedder, config.search.clone()))
}

/// Build a crawler over the configured store, extractor, and embedding provider.
pub async fn build_crawler(config: &Config) -> Result<Crawler> {
    let store = open_store(config).await?;
    let embedder = create_provider(&config.embedding)?;
    let extractor = Arc::new(FormatExtractor::new(config.ocr.clone()));
    Ok(Crawler::new(
        store,
        extractor,
        embedder,
        config.crawler.clone(),
    ))
}

pub async fn run_init(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    store.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

pub async fn run_crawl(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let crawler = build_crawler(config).await?;
    let report = crawler.run_crawl(cancel).await?;

    println!("crawl {}", config.crawler.root.display());
    println!("  discovered: {}", report.discovered);
    println!("  indexed: {}", report.indexed);
    println!("  unchanged: {}", report.unchanged);
    println!("  skipped: {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("    {}: {}", skipped.path, skipped.reason);
    }
    println!("  entries written: {}", report.entries_written);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", report.embeddings_written);
        println!("  embeddings failed: {}", report.embeddings_failed);
    }
    if report.cancelled {
        println!("cancelled");
    } else {
        println!("ok");
    }
    Ok(())
}

pub async fn run_sweep(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let crawler = build_crawler(config).await?;
    let report = crawler.run_sweep(cancel).await?;

    println!("sweep");
    println!("  checked: {}", report.checked);
    println!("  removed: {}", report.removed);
    if report.cancelled {
        println!("cancelled");
    } else {
        println!("ok");
    }
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, extensions: &[String]) -> Result<()> {
    let engine = build_engine(config).await?;
    let results = engine.search(query, extensions).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let ids: Vec<String> = results.iter().map(|d| d.id.clone()).collect();
    let matches = engine
        .store()
        .find_matching_entries(&ids, query.trim())
        .await?;

    for (i, doc) in results.iter().enumerate() {
        println!("{}. {}", i + 1, doc.file_name);
        println!("    path:     {}", doc.file_path);
        println!("    id:       {}", doc.id);
        println!("    modified: {}", format_ts_millis(doc.last_modified));
        let hits: Vec<&IndexEntry> = matches.iter().filter(|e| e.document_id == doc.id).collect();
        if !hits.is_empty() {
            println!("    matches:  {}", describe_hits(&hits));
        }
    }
    Ok(())
}

/// `page 2, page 5` for paginated formats, `content` for whole-file entries.
fn describe_hits(hits: &[&IndexEntry]) -> String {
    let mut pages: Vec<u32> = hits.iter().filter_map(|e| e.page_number).collect();
    pages.dedup();
    if pages.is_empty() {
        return "content".to_string();
    }
    pages
        .iter()
        .map(|p| format!("page {}", p))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let doc = match store.get_document(id).await? {
        Some(doc) => doc,
        None => bail!("Document not found: {}", id),
    };
    let entries = store.get_entries_for_document(id).await?;

    println!("--- Document ---");
    println!("id:            {}", doc.id);
    println!("file_name:     {}", doc.file_name);
    println!("file_path:     {}", doc.file_path);
    println!("mime_type:     {}", doc.mime_type);
    println!("size:          {}", doc.size);
    println!("last_modified: {}", format_ts_millis(doc.last_modified));
    println!("indexed_at:    {}", format_ts_millis(doc.indexed_at));
    println!();

    println!("--- Entries ({}) ---", entries.len());
    for entry in entries {
        let vector = if entry.embedding.is_some() {
            "embedded"
        } else {
            "no embedding"
        };
        match entry.page_number {
            Some(page) => println!("[page {}] ({})", page, vector),
            None => println!("[entry {}] ({})", entry.id, vector),
        }
        println!("{}", entry.content);
        println!();
    }
    Ok(())
}

pub async fn run_extensions(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    for ext in store.list_extensions().await? {
        if ext.is_empty() {
            println!("(none)");
        } else {
            println!("{}", ext);
        }
    }
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.stats().await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("omnizient index");
    println!();
    println!("  Database:   {}", config.db.path.display());
    println!("  Size:       {}", format_bytes(db_size));
    println!();
    println!("  Documents:  {}", stats.documents);
    println!("  Entries:    {}", stats.entries);
    let pct = if stats.entries > 0 {
        stats.embedded_entries as f64 / stats.entries as f64 * 100.0
    } else {
        0.0
    };
    println!("  Embedded:   {} ({:.0}%)", stats.embedded_entries, pct);
    Ok(())
}

pub async fn run_serve(config: &Config) -> Result<()> {
    let engine = Arc::new(build_engine(config).await?);
    server::run_server(&config.server.bind, engine).await
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_millis(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
