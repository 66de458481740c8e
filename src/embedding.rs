//! Embedding provider abstraction and implementations.
//!
//! Defines the [`TextEmbedder`] trait and concrete backends:
//! - **local** — runs a sentence-embedding model via fastembed; the model is
//!   chosen by walking a prioritized fallback chain at construction.
//! - **openai** — calls an OpenAI-compatible embeddings API with retry and
//!   backoff.
//! - **disabled** — no backend; consumers degrade to lexical search.
//!
//! [`load_embedder`] performs the one-time model selection at startup.
//! It returns `None` when no backend can be loaded — the UNAVAILABLE state —
//! and every downstream consumer then falls back to lexical search. The
//! choice is never revisited mid-lifetime: a call-time failure is an error,
//! not a trigger to swap models, since a swap would produce embeddings of
//! incompatible dimensionality for entries already indexed.
//!
//! Also provides the vector utilities shared with the index:
//! - [`cosine_distance`] — distance between two embedding vectors (lower =
//!   more similar)
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB codec for
//!   SQLite storage
//!
//! # Retry Strategy (openai backend)
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Trait for embedding backends.
///
/// Implementations are selected once at startup by [`load_embedder`] and
/// shared behind an `Arc` for the process lifetime. Tests substitute fakes.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-MiniLM-L6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// The prioritized local-model fallback chain, best first. The configured
/// preferred alias is tried before this list.
const FALLBACK_CHAIN: &[&str] = &["mpnet", "mxbai", "gte", "minilm"];

/// Select and load an embedding backend. Called once at startup.
///
/// Returns `None` (UNAVAILABLE) when the provider is `disabled` or every
/// candidate fails to load; callers must then use lexical search. The
/// degradation is logged, not surfaced as an error.
pub fn load_embedder(config: &EmbeddingConfig) -> Option<Arc<dyn TextEmbedder>> {
    match config.provider.as_str() {
        "disabled" => {
            tracing::info!("embedding provider disabled; lexical search only");
            None
        }
        "openai" => match OpenAIEmbedder::new(config) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                tracing::warn!("could not initialize openai embedder: {e}; degrading to lexical search");
                None
            }
        },
        "local" => load_local_chain(config),
        other => {
            tracing::warn!("unknown embedding provider '{other}'; degrading to lexical search");
            None
        }
    }
}

/// Walk the local model chain: preferred alias first, then the fixed
/// priority list, returning the first model that loads.
#[cfg(feature = "local-embeddings")]
fn load_local_chain(config: &EmbeddingConfig) -> Option<Arc<dyn TextEmbedder>> {
    let preferred = config.model.as_deref().unwrap_or("mpnet");
    let mut candidates: Vec<&str> = vec![preferred];
    candidates.extend(FALLBACK_CHAIN.iter().filter(|a| **a != preferred));

    for alias in candidates {
        match LocalEmbedder::load(alias) {
            Ok(embedder) => {
                tracing::info!(model = embedder.model_name(), "loaded local embedding model");
                return Some(Arc::new(embedder));
            }
            Err(e) => {
                tracing::warn!("failed to load embedding model '{alias}': {e}");
            }
        }
    }

    tracing::warn!("all embedding models failed to load; degrading to lexical search");
    None
}

#[cfg(not(feature = "local-embeddings"))]
fn load_local_chain(_config: &EmbeddingConfig) -> Option<Arc<dyn TextEmbedder>> {
    tracing::warn!(
        "local embedding provider requires the local-embeddings feature; degrading to lexical search"
    );
    None
}

// ============ Local Provider (fastembed) ============

/// Embedding backend running a local fastembed model.
///
/// The model is loaded once in [`LocalEmbedder::load`]; inference itself is
/// synchronous CPU work, which fits the request-scoped blocking pipeline.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    name: &'static str,
    dims: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    /// Resolve an alias against the supported model table and load it.
    pub fn load(alias: &str) -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let (model_id, name, dims) = match alias {
            "mpnet" => (
                EmbeddingModel::ParaphraseMLMpnetBaseV2,
                "paraphrase-multilingual-mpnet-base-v2",
                768,
            ),
            "mxbai" => (EmbeddingModel::MxbaiEmbedLargeV1, "mxbai-embed-large-v1", 1024),
            "gte" => (EmbeddingModel::GTEBaseENV15, "gte-base-en-v1.5", 768),
            "minilm" => (EmbeddingModel::AllMiniLML6V2, "all-MiniLM-L6-v2", 384),
            other => bail!("unknown embedding model alias: {other}"),
        };

        let model = TextEmbedding::try_new(InitOptions::new(model_id))?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
            name,
            dims,
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl TextEmbedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<String> = texts.to_vec();
        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("embedding model lock poisoned"))?;
        let vectors = model.embed(inputs, None)?;
        Ok(vectors)
    }
}

// ============ OpenAI-compatible Provider ============

/// Embedding backend calling an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIEmbedder {
    /// Create the provider from configuration.
    ///
    /// Fails when `model`/`dims` are missing or `OPENAI_API_KEY` is not in
    /// the environment — failure here means this link of the chain did not
    /// load, not a hard error for the pipeline.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for openai provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for openai provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            client,
            api_key,
        })
    }
}

#[async_trait]
impl TextEmbedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("embeddings API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("embeddings API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed after retries")))
    }
}

/// Parse an OpenAI-compatible embeddings response: `data[].embedding`
/// arrays, in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance between two embedding vectors: `1 − cos(a, b)`.
///
/// `0.0` = identical direction, `1.0` = orthogonal, `2.0` = opposite.
/// Returns `1.0` (no similarity) for empty or mismatched vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
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
        return 1.0;
    }

    1.0 - dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_distance_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_distance_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_mismatched_lengths() {
        assert_eq!(cosine_distance(&[1.0, 2.0], &[1.0]), 1.0);
        assert_eq!(cosine_distance(&[], &[]), 1.0);
    }

    #[test]
    fn test_parse_embeddings_response() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2]},
                {"embedding": [0.3, 0.4]},
            ]
        });
        let vecs = parse_embeddings_response(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[1].len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed_response() {
        let json = serde_json::json!({"unexpected": true});
        assert!(parse_embeddings_response(&json).is_err());
    }

    #[test]
    fn test_disabled_provider_is_unavailable() {
        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..Default::default()
        };
        assert!(load_embedder(&config).is_none());
    }
}
