//! TOML configuration parsing and validation.
//!
//! A single file (default `./config/omnizient.toml`) carries every setting the
//! crawler, embedding provider, search engine, and HTTP mirror need. Sections
//! other than `[db]` and `[crawler]` are optional and fall back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/omnizient.sqlite"
//!
//! [crawler]
//! root = "/home/me/Documents"
//! include_globs = ["**/*"]
//! workers = 4
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are not extracted and count as skipped.
    #[serde(default = "default_max_extract_bytes")]
    pub max_extract_bytes: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_max_extract_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    32_768
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: default_ocr_command(),
            language: default_ocr_language(),
        }
    }
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,
    /// Semantic candidates scoring below this cosine similarity are dropped.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_top_k: default_semantic_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

fn default_semantic_top_k() -> usize {
    20
}
fn default_min_similarity() -> f32 {
    0.25
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// Config with every optional section at its default.
    pub fn minimal(db_path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            crawler: CrawlerConfig {
                root: root.into(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                follow_symlinks: false,
                max_extract_bytes: default_max_extract_bytes(),
                workers: default_workers(),
            },
            embedding: EmbeddingConfig::default(),
            ocr: OcrConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.crawler.workers == 0 {
        bail!("crawler.workers must be >= 1");
    }

    if config.search.semantic_top_k == 0 {
        bail!("search.semantic_top_k must be >= 1");
    }

    if !(-1.0..=1.0).contains(&config.search.min_similarity) {
        bail!("search.min_similarity must be in [-1.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, ollama, or local.",
            other
        ),
    }

    if config.embedding.provider == "ollama" && config.embedding.model.is_none() {
        bail!("embedding.model must be specified when provider is 'ollama'");
    }

    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}
