//! Crawler: reconciles the Index Store with a file-system root.
//!
//! A full crawl walks the root, and for every file compares size and
//! modification time with the stored [`Document`]:
//!
//! ```text
//! new / changed ──► extract ──► embed each unit ──► index_document ──► indexed
//! unchanged ─────────────────────────────────────────────────────────► indexed (cached)
//! ```
//!
//! Files are processed by a bounded pool of tasks (`crawler.workers`), in no
//! particular order. Per-file failures (extraction, oversized files, a
//! rolled-back store write) are recorded in the [`CrawlReport`] and the crawl
//! moves on; a failed store read aborts the crawl. Cancellation is observed
//! between files; a file already being processed finishes its write.
//!
//! Removed files are handled by a separate [`Crawler::run_sweep`], which
//! deletes every stored document whose path no longer exists.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::classify;
use crate::config::CrawlerConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbedError, ExtractError, StoreError};
use crate::extract::ContentExtractor;
use crate::models::{document_id_for_path, Document, NewIndexEntry};
use crate::store::IndexStore;

const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A regular file seen during discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Canonical path string; the document id derives from it.
    pub file_path: String,
    pub file_name: String,
    pub size: i64,
    /// Epoch milliseconds.
    pub last_modified: i64,
}

/// A file the crawl could not (re)index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of [`Crawler::run_crawl`].
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub discovered: usize,
    /// New or changed files whose entries were rebuilt.
    pub indexed: usize,
    pub unchanged: usize,
    pub skipped: Vec<SkippedFile>,
    pub entries_written: usize,
    pub embeddings_written: usize,
    pub embeddings_failed: usize,
    pub cancelled: bool,
}

/// Outcome of [`Crawler::run_sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub removed: usize,
    pub cancelled: bool,
}

enum FileOutcome {
    Indexed {
        entries: usize,
        embedded: usize,
        embed_failed: usize,
    },
    Unchanged,
    Skipped(SkippedFile),
}

impl CrawlReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Indexed {
                entries,
                embedded,
                embed_failed,
            } => {
                self.indexed += 1;
                self.entries_written += entries;
                self.embeddings_written += embedded;
                self.embeddings_failed += embed_failed;
            }
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Skipped(skipped) => self.skipped.push(skipped),
        }
    }

    /// Fold one finished worker into the report. A store read failure is
    /// handed back to abort the crawl.
    fn record_joined(
        &mut self,
        joined: Result<Result<FileOutcome, StoreError>, JoinError>,
    ) -> Result<(), StoreError> {
        match joined {
            Ok(Ok(outcome)) => {
                self.record(outcome);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => {
                warn!(error = %e, "crawl worker did not finish");
                self.skipped.push(SkippedFile {
                    path: "(unknown)".to_string(),
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }
}

/// Collaborators shared by every worker task.
struct Pipeline {
    store: Arc<dyn IndexStore>,
    extractor: Arc<dyn ContentExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_extract_bytes: u64,
}

pub struct Crawler {
    pipeline: Arc<Pipeline>,
    config: CrawlerConfig,
}

impl Crawler {
    pub fn new(
        store: Arc<dyn IndexStore>,
        extractor: Arc<dyn ContentExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                store,
                extractor,
                embedder,
                max_extract_bytes: config.max_extract_bytes,
            }),
            config,
        }
    }

    /// Run one full crawl of `crawler.root`.
    ///
    /// Returns an error only when the root cannot be walked or the store
    /// cannot be read; everything else is reported per file.
    pub async fn run_crawl(&self, cancel: &CancellationToken) -> Result<CrawlReport> {
        let started = Instant::now();
        let config = self.config.clone();
        let files = tokio::task::spawn_blocking(move || discover(&config)).await??;

        info!(
            root = %self.config.root.display(),
            files = files.len(),
            workers = self.config.workers,
            "crawl started"
        );

        let mut report = CrawlReport {
            discovered: files.len(),
            ..CrawlReport::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks: JoinSet<Result<FileOutcome, StoreError>> = JoinSet::new();
        let mut fatal: Option<StoreError> = None;

        for file in files {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            // Cancellation wins over a slot freed by the same finishing file.
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => permit?,
            };

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = report.record_joined(joined) {
                    fatal.get_or_insert(e);
                }
            }
            if fatal.is_some() {
                break;
            }

            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(async move {
                let _permit = permit;
                pipeline.process_file(file).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = report.record_joined(joined) {
                fatal.get_or_insert(e);
            }
        }

        if let Some(e) = fatal {
            return Err(e.into());
        }

        info!(
            discovered = report.discovered,
            indexed = report.indexed,
            unchanged = report.unchanged,
            skipped = report.skipped.len(),
            entries = report.entries_written,
            embeddings = report.embeddings_written,
            cancelled = report.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crawl finished"
        );
        Ok(report)
    }

    /// Delete every stored document whose file no longer exists.
    pub async fn run_sweep(&self, cancel: &CancellationToken) -> Result<SweepReport> {
        let store = &self.pipeline.store;
        let docs = store.list_documents().await?;
        let mut report = SweepReport::default();

        for doc in docs {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.checked += 1;

            // An unreadable path is not proof of removal.
            let exists = tokio::fs::try_exists(&doc.file_path)
                .await
                .unwrap_or(true);
            if exists {
                continue;
            }

            match store.delete_document(&doc.id).await {
                Ok(true) => {
                    debug!(path = %doc.file_path, "removed document for missing file");
                    report.removed += 1;
                }
                Ok(false) => {}
                Err(e @ StoreError::WriteFailed { .. }) => {
                    warn!(path = %doc.file_path, error = %e, "could not remove document");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            checked = report.checked,
            removed = report.removed,
            cancelled = report.cancelled,
            "sweep finished"
        );
        Ok(report)
    }
}

impl Pipeline {
    async fn process_file(&self, file: DiscoveredFile) -> Result<FileOutcome, StoreError> {
        let id = document_id_for_path(&file.file_path);

        if let Some(existing) = self.store.get_document(&id).await? {
            if existing.is_unchanged(file.size, file.last_modified) {
                debug!(path = %file.file_path, "unchanged");
                return Ok(FileOutcome::Unchanged);
            }
        }

        if file.size as u64 > self.max_extract_bytes {
            let err = ExtractError::TooLarge {
                path: file.path.clone(),
                size: file.size as u64,
                limit: self.max_extract_bytes,
            };
            warn!(path = %file.file_path, error = %err, "skipping file");
            return Ok(skipped(file, err));
        }

        let mime_type = classify(&file.path);
        let units = match self.extractor.extract(&file.path, &mime_type).await {
            Ok(units) => units,
            Err(e) => {
                warn!(path = %file.file_path, error = %e, "extraction failed, keeping previous index state");
                return Ok(skipped(file, e));
            }
        };

        let mut entries = Vec::with_capacity(units.len());
        let mut embedded = 0;
        let mut embed_failed = 0;
        for unit in units {
            let embedding = match self.embedder.embed(&unit.text).await {
                Ok(vector) => {
                    embedded += 1;
                    Some(vector)
                }
                Err(EmbedError::Disabled) => None,
                Err(e) => {
                    embed_failed += 1;
                    warn!(
                        path = %file.file_path,
                        page = ?unit.page_number,
                        error = %e,
                        "embedding failed, storing entry without vector"
                    );
                    None
                }
            };
            entries.push(NewIndexEntry {
                content: unit.text,
                page_number: unit.page_number,
                embedding,
            });
        }

        let doc = Document {
            id,
            file_name: file.file_name,
            file_path: file.file_path,
            mime_type,
            size: file.size,
            last_modified: file.last_modified,
            indexed_at: chrono::Utc::now().timestamp_millis(),
        };

        match self.store.index_document(&doc, &entries).await {
            Ok(()) => {
                debug!(path = %doc.file_path, entries = entries.len(), "indexed");
                Ok(FileOutcome::Indexed {
                    entries: entries.len(),
                    embedded,
                    embed_failed,
                })
            }
            Err(e @ StoreError::WriteFailed { .. }) => {
                warn!(path = %doc.file_path, error = %e, "index write rolled back");
                Ok(FileOutcome::Skipped(SkippedFile {
                    path: doc.file_path,
                    reason: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }
}

fn skipped(file: DiscoveredFile, err: ExtractError) -> FileOutcome {
    FileOutcome::Skipped(SkippedFile {
        path: file.file_path,
        reason: err.to_string(),
    })
}

/// Walk `config.root` and return every regular file that passes the
/// include/exclude globs, sorted by path.
pub fn discover(config: &CrawlerConfig) -> Result<Vec<DiscoveredFile>> {
    let root = std::fs::canonicalize(&config.root)
        .with_context(|| format!("Crawl root does not exist: {}", config.root.display()))?;
    if !root.is_dir() {
        bail!("Crawl root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).follow_links(config.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file without metadata");
                continue;
            }
        };
        let last_modified = metadata
            .modified()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or(0);

        files.push(DiscoveredFile {
            path: path.to_path_buf(),
            file_path: path.to_string_lossy().into_owned(),
            file_name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len() as i64,
            last_modified,
        });
    }

    files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
