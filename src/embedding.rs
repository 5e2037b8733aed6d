//! Embedding Generator: provider abstraction, implementations, vector utilities.
//!
//! Every provider turns text into a fixed-length `f32` vector and is
//! deterministic for identical input and model version.
//!
//! | Config value | Provider | Notes |
//! |--------------|----------|-------|
//! | `"disabled"` | [`DisabledProvider`] | Always [`EmbedError::Disabled`] |
//! | `"hash"` | [`HashProvider`] | Offline feature hashing, no model download |
//! | `"ollama"` | [`OllamaProvider`] | Local Ollama `/api/embed`, retry + backoff |
//! | `"local"` | `LocalProvider` | fastembed ONNX model, cached after first load |
//!
//! Text longer than `embedding.max_input_chars` fails with
//! [`EmbedError::InputTooLong`]; the crawler then stores the entry without
//! a vector.
//!
//! Vectors are persisted as little-endian `f32` BLOBs ([`vec_to_blob`],
//! [`blob_to_vec`]) and compared with [`cosine_similarity`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

/// A text embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Vector length produced by [`embed`](EmbeddingProvider::embed).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Failed("empty embedding response".to_string()))
    }
}

fn check_input_lengths(texts: &[String], max_chars: usize) -> Result<(), EmbedError> {
    for text in texts {
        let chars = text.chars().count();
        if chars > max_chars {
            return Err(EmbedError::InputTooLong {
                chars,
                max: max_chars,
            });
        }
    }
    Ok(())
}

fn check_dims(vectors: &[Vec<f32>], dims: usize) -> Result<(), EmbedError> {
    match vectors.iter().find(|v| v.len() != dims) {
        Some(v) => Err(EmbedError::Failed(format!(
            "model returned {} dimensions, expected {}",
            v.len(),
            dims
        ))),
        None => Ok(()),
    }
}

// ============ Disabled Provider ============

/// Used when `embedding.provider = "disabled"`. Every call fails, which
/// leaves entries unembedded and the semantic strategy empty.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

// ============ Hash Provider ============

/// Bag-of-words feature hashing into a fixed number of buckets, L2-normalized.
///
/// Needs no model and no network. Documents sharing words with a query score
/// above zero; it is a lexical stand-in for a real model, mostly useful for
/// tests and for machines where no model can be downloaded.
pub struct HashProvider {
    dims: usize,
    max_input_chars: usize,
}

impl HashProvider {
    pub const DEFAULT_DIMS: usize = 1024;

    pub fn new(dims: usize, max_input_chars: usize) -> Self {
        Self {
            dims,
            max_input_chars,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.dims.unwrap_or(Self::DEFAULT_DIMS),
            config.max_input_chars,
        )
    }

    fn hash_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        check_input_lengths(texts, self.max_input_chars)?;
        Ok(texts.iter().map(|t| self.hash_text(t)).collect())
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). HTTP 429 and 5xx responses and connection
/// errors are retried with exponential backoff (1s, 2s, 4s, ... capped at
/// 32s); other 4xx responses fail immediately.
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    max_input_chars: usize,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            max_input_chars: config.max_input_chars,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        check_input_lengths(texts, self.max_input_chars)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| EmbedError::Failed(e.to_string()))?;
                        let vectors = parse_ollama_response(&json)?;
                        check_dims(&vectors, self.dims)?;
                        return Ok(vectors);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = EmbedError::Failed(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    ));
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(EmbedError::Failed(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            EmbedError::Failed("Ollama embedding failed after retries".to_string())
        }))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            EmbedError::Failed("Invalid Ollama response: missing embeddings array".to_string())
        })?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect::<Vec<f32>>()
                })
                .ok_or_else(|| {
                    EmbedError::Failed(
                        "Invalid Ollama response: embedding is not an array".to_string(),
                    )
                })
        })
        .collect()
}

// ============ Local Provider (fastembed) ============

/// Runs a sentence-embedding model in-process via fastembed.
///
/// The model is downloaded from Hugging Face on first use and kept loaded
/// for the life of the provider. Inference runs on the blocking pool.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    batch_size: usize,
    max_input_chars: usize,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let model = config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| default_local_dims(&model_name));

        Ok(Self {
            model_name,
            model,
            dims,
            batch_size: config.batch_size,
            max_input_chars: config.max_input_chars,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_local_dims(model_name: &str) -> usize {
    match model_name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        check_input_lengths(texts, self.max_input_chars)?;

        let loaded = Arc::clone(&self.loaded);
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| EmbedError::Failed("local model lock poisoned".to_string()))?;
            if guard.is_none() {
                let embedder = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(false),
                )
                .map_err(|e| {
                    EmbedError::Failed(format!("Failed to initialize local embedding model: {}", e))
                })?;
                *guard = Some(embedder);
            }
            let embedder = guard
                .as_mut()
                .ok_or_else(|| EmbedError::Failed("local model not loaded".to_string()))?;
            embedder
                .embed(texts, Some(batch_size))
                .map_err(|e| EmbedError::Failed(format!("Local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| EmbedError::Failed(e.to_string()))??;

        check_dims(&vectors, self.dims)?;
        Ok(vectors)
    }
}

/// Create the [`EmbeddingProvider`] named by `embedding.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "hash" => Ok(Arc::new(HashProvider::from_config(config))),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as little-endian `f32` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero, or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
